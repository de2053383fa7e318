use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinSet;

use portaria_domain::{
	token_ref::{self, TokenRef},
	tracking::{self, LocationStep, TrackingToken, Visitor},
};
use portaria_storage::firestore::{FieldFilter, FieldOp, FieldValue, StoredDocument};

use crate::{DocumentStore, Error, PortariaService, Result};

/// Upper bound appended to a prefix for a lexicographic range query.
const PREFIX_SENTINEL: char = '\u{f8ff}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedVia {
	/// Steps whose stored reference equals the token's document reference.
	Direct,
	/// Full scan of the step collection matched by reference substring.
	FallbackScan,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedSteps {
	pub token_id: String,
	/// Ascending by timestamp.
	pub steps: Vec<LocationStep>,
	pub resolved_via: ResolvedVia,
	/// Set when the reference had no recognizable shape and its serialized form was used.
	pub lossy_reference: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenTracking {
	pub token: TrackingToken,
	pub steps: Vec<LocationStep>,
	pub resolved_via: Option<ResolvedVia>,
	/// Resolution failure for this token; its steps are empty when set.
	pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackedVisitor {
	pub visitor: Visitor,
	pub tokens: Vec<TokenTracking>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VisitorTracking {
	pub visitors: Vec<TrackedVisitor>,
	pub total_tokens: usize,
	pub steps_count: usize,
}

impl PortariaService {
	/// Steps emitted by the token `reference` points at, in any of its stored shapes.
	pub async fn resolve_steps(&self, reference: Value) -> Result<ResolvedSteps> {
		let reference = TokenRef::from_value(reference);

		resolve(self.backends.documents.clone(), self.cfg.tracking.clone(), reference).await
	}

	/// Finds visitors whose display name starts with `name`, then resolves the steps of
	/// every token assigned to them concurrently. A token that fails to resolve keeps an
	/// empty step list and the failure message; its siblings are unaffected.
	pub async fn visitor_tracking(&self, name: &str) -> Result<VisitorTracking> {
		self.visitor_tracking_inner(name).await.map_err(Error::retrieval("visitor_tracking"))
	}

	async fn visitor_tracking_inner(&self, name: &str) -> Result<VisitorTracking> {
		let cfg = &self.cfg.tracking;
		let prefix = name.trim().to_uppercase();

		if prefix.is_empty() {
			return Err(Error::invalid("name must not be empty."));
		}

		let filters = [
			FieldFilter::new(
				"display_name",
				FieldOp::GreaterThanOrEqual,
				FieldValue::String(prefix.clone()),
			),
			FieldFilter::new(
				"display_name",
				FieldOp::LessThanOrEqual,
				FieldValue::String(format!("{prefix}{PREFIX_SENTINEL}")),
			),
		];
		let limit = u32::try_from(cfg.max_visitors).unwrap_or(u32::MAX);
		let visitor_docs =
			self.backends.documents.query(&cfg.users_collection, &filters, Some(limit)).await?;
		let visitors = visitor_docs
			.into_iter()
			.take(cfg.max_visitors)
			.map(|doc| {
				Visitor::from_document(&doc.id, doc.data)
					.map_err(|source| Error::Validation { schema: "Visitor", source })
			})
			.collect::<Result<Vec<_>>>()?;
		let assignments = self.assign_tokens(visitors).await?;
		let outcomes = self.resolve_concurrently(&assignments).await;
		let mut outcomes = outcomes.into_iter();
		let mut visitors = Vec::with_capacity(assignments.len());
		let mut total_tokens = 0;
		let mut steps_count = 0;

		for (visitor, tokens) in assignments {
			let mut tracked = Vec::with_capacity(tokens.len());

			for token in tokens {
				let outcome = outcomes.next().flatten().unwrap_or_else(|| {
					Err(Error::invalid(format!("Step resolution for {} did not finish.", token.id)))
				});
				let tracking = match outcome {
					Ok(resolved) => TokenTracking {
						token,
						steps: resolved.steps,
						resolved_via: Some(resolved.resolved_via),
						error: None,
					},
					Err(err) => {
						tracing::warn!(
							token_id = %token.id,
							error = %err,
							"Step resolution failed; continuing with an empty history."
						);

						TokenTracking {
							token,
							steps: Vec::new(),
							resolved_via: None,
							error: Some(err.to_string()),
						}
					},
				};

				total_tokens += 1;
				steps_count += tracking.steps.len();
				tracked.push(tracking);
			}

			visitors.push(TrackedVisitor { visitor, tokens: tracked });
		}

		Ok(VisitorTracking { visitors, total_tokens, steps_count })
	}

	/// Looks up every visitor's tokens concurrently. Any failed lookup fails the whole
	/// call; results keep the order of `visitors`.
	async fn assign_tokens(
		&self,
		visitors: Vec<Visitor>,
	) -> Result<Vec<(Visitor, Vec<TrackingToken>)>> {
		let mut set = JoinSet::new();

		for (index, visitor) in visitors.iter().enumerate() {
			let documents = self.backends.documents.clone();
			let tracking = self.cfg.tracking.clone();
			let uid = visitor.uid.clone();

			set.spawn(async move { (index, assigned_tokens(documents, tracking, uid).await) });
		}

		let mut slots: Vec<Option<Vec<TrackingToken>>> = vec![None; visitors.len()];

		while let Some(joined) = set.join_next().await {
			match joined {
				Ok((index, outcome)) => slots[index] = Some(outcome?),
				Err(err) => tracing::warn!(error = %err, "Token lookup task failed."),
			}
		}

		visitors
			.into_iter()
			.zip(slots)
			.map(|(visitor, tokens)| match tokens {
				Some(tokens) => {
					tracing::info!(
						visitor = %visitor.uid,
						tokens = tokens.len(),
						"Found tokens assigned to visitor."
					);

					Ok((visitor, tokens))
				},
				None => Err(Error::invalid(format!(
					"Token lookup for visitor {} did not finish.",
					visitor.uid
				))),
			})
			.collect()
	}

	/// One outcome per token in `assignments` order; `None` when the task did not complete.
	async fn resolve_concurrently(
		&self,
		assignments: &[(Visitor, Vec<TrackingToken>)],
	) -> Vec<Option<Result<ResolvedSteps>>> {
		let mut set = JoinSet::new();
		let mut slots = Vec::new();

		for (_, tokens) in assignments {
			for token in tokens {
				let index = slots.len();
				let documents = self.backends.documents.clone();
				let tracking = self.cfg.tracking.clone();
				let reference = TokenRef::Text(token.id.clone());

				slots.push(None);
				set.spawn(async move { (index, resolve(documents, tracking, reference).await) });
			}
		}

		while let Some(joined) = set.join_next().await {
			match joined {
				Ok((index, outcome)) => slots[index] = Some(outcome),
				Err(err) => tracing::warn!(error = %err, "Step resolution task failed."),
			}
		}

		slots
	}
}

async fn assigned_tokens(
	documents: Arc<dyn DocumentStore>,
	cfg: portaria_config::Tracking,
	uid: String,
) -> Result<Vec<TrackingToken>> {
	let user_path = format!("{}/{uid}", cfg.users_collection);
	let token_docs = documents
		.query(
			&cfg.tokens_collection,
			&[FieldFilter::new(
				"users_assigned",
				FieldOp::ArrayContains,
				FieldValue::Reference(user_path),
			)],
			None,
		)
		.await?;

	token_docs
		.into_iter()
		.map(|doc| {
			TrackingToken::from_document(&doc.id, doc.data)
				.map_err(|source| Error::Validation { schema: "TrackingToken", source })
		})
		.collect()
}

async fn resolve(
	documents: Arc<dyn DocumentStore>,
	cfg: portaria_config::Tracking,
	reference: TokenRef,
) -> Result<ResolvedSteps> {
	let (token_id, lossy_reference) = match reference.canonical_id(&cfg.tokens_collection) {
		Ok(id) => (id, false),
		Err(err) if cfg.strict_token_refs => return Err(err.into()),
		Err(err) => {
			tracing::warn!(
				raw = %err.raw,
				"Token reference has no recognizable shape; matching on its serialized form."
			);

			(err.raw, true)
		},
	};

	match find_steps(documents.as_ref(), &cfg, &token_id, lossy_reference).await {
		Ok((docs, resolved_via)) => {
			let mut steps = docs
				.iter()
				.map(|doc| LocationStep::from_document(&doc.id, &doc.data, &cfg.tokens_collection))
				.collect::<Vec<_>>();

			tracking::sort_steps(&mut steps);

			Ok(ResolvedSteps { token_id, steps, resolved_via, lossy_reference })
		},
		Err(err) => Err(Error::Resolution { token_id, source: Box::new(err) }),
	}
}

async fn find_steps(
	documents: &dyn DocumentStore,
	cfg: &portaria_config::Tracking,
	token_id: &str,
	lossy_reference: bool,
) -> Result<(Vec<StoredDocument>, ResolvedVia)> {
	// A serialized object is never a valid document path, so only the scan can match it.
	if !lossy_reference {
		let reference = FieldValue::Reference(format!("{}/{token_id}", cfg.tokens_collection));
		let direct = documents
			.query(
				&cfg.steps_collection,
				&[FieldFilter::new("tokenRef", FieldOp::Equal, reference)],
				None,
			)
			.await?;

		if !direct.is_empty() {
			return Ok((direct, ResolvedVia::Direct));
		}
	}

	let scanned = documents.list(&cfg.steps_collection).await?;
	let matched = scanned
		.into_iter()
		.filter(|doc| {
			doc.data
				.get("tokenRef")
				.is_some_and(|stored| token_ref::stored_ref_contains(stored, token_id))
		})
		.collect::<Vec<_>>();

	tracing::info!(
		token_id,
		matched = matched.len(),
		"Direct step lookup found nothing; used a full scan."
	);

	Ok((matched, ResolvedVia::FallbackScan))
}
