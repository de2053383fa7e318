use serde::{Deserialize, Serialize};
use serde_json::Value;

use portaria_domain::{
	access::{AccessRecord, MAX_LIMIT, MAX_OFFSET, SearchQuery},
	classify, normalize,
};
use portaria_storage::qdrant::VectorSearch;

use crate::{Error, PortariaService, Result, filter};

pub const PERSON_HISTORY_LIMIT: u32 = 20;
pub const RESIDENT_VISITS_LIMIT: u32 = 20;
pub const VEHICLE_RECORDS_LIMIT: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextSearchRequest {
	pub query: String,
	#[serde(default)]
	pub limit: Option<u32>,
	#[serde(default)]
	pub offset: u32,
	/// Similarity floor for the unfiltered vector search; the configured default when absent.
	#[serde(default)]
	pub score_threshold: Option<f32>,
}

/// How a page of records was retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
	/// Vector search restricted to records naming the queried person.
	PersonHybrid,
	/// Vector search over the normalized query with no filter.
	Vector,
	/// Vector search over the free text restricted by the structured filter.
	FilteredVector,
	/// Filter-only scan in stable order.
	Scan,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessPage {
	pub records: Vec<AccessRecord>,
	pub total: usize,
	/// True when the page is full. Top-k backends report no remaining count, so this is
	/// an estimate.
	pub has_more: bool,
	pub strategy: SearchStrategy,
}
impl AccessPage {
	fn new(records: Vec<AccessRecord>, limit: u32, strategy: SearchStrategy) -> Self {
		let total = records.len();

		Self { records, total, has_more: total == limit as usize, strategy }
	}
}

impl PortariaService {
	/// Free-text search. Queries that look like a visitor name first try a vector search
	/// restricted to the name fields; any hit from that path is returned as-is.
	pub async fn search_text(&self, req: TextSearchRequest) -> Result<AccessPage> {
		self.search_text_inner(req).await.map_err(Error::retrieval("search_text"))
	}

	/// Structured search. Free text runs a filtered vector search; without it the filter is
	/// scanned in stable order, and with no structured field either the whole collection is.
	pub async fn search_filtered(&self, query: SearchQuery) -> Result<AccessPage> {
		self.search_filtered_inner(query).await.map_err(Error::retrieval("search_filtered"))
	}

	pub async fn people_inside(&self, limit: Option<u32>) -> Result<AccessPage> {
		self.search_filtered(SearchQuery {
			ainda_dentro: Some(true),
			limit: limit.unwrap_or(self.cfg.search.default_limit),
			..SearchQuery::default()
		})
		.await
	}

	pub async fn person_history(
		&self,
		document: &str,
		start: Option<String>,
		end: Option<String>,
		limit: Option<u32>,
	) -> Result<AccessPage> {
		required("pessoa_documento", document)?;

		self.search_filtered(SearchQuery {
			pessoa_documento: Some(document.to_string()),
			data_inicio: start,
			data_fim: end,
			limit: limit.unwrap_or(PERSON_HISTORY_LIMIT),
			..SearchQuery::default()
		})
		.await
	}

	pub async fn resident_visits(
		&self,
		resident_name: &str,
		start: Option<String>,
		end: Option<String>,
		limit: Option<u32>,
	) -> Result<AccessPage> {
		required("morador_nome", resident_name)?;

		self.search_filtered(SearchQuery {
			morador_nome: Some(resident_name.to_string()),
			data_inicio: start,
			data_fim: end,
			limit: limit.unwrap_or(RESIDENT_VISITS_LIMIT),
			..SearchQuery::default()
		})
		.await
	}

	pub async fn vehicle_records(&self, plate: &str, limit: Option<u32>) -> Result<AccessPage> {
		required("veiculo_placa", plate)?;

		self.search_filtered(SearchQuery {
			veiculo_placa: Some(plate.to_string()),
			limit: limit.unwrap_or(VEHICLE_RECORDS_LIMIT),
			..SearchQuery::default()
		})
		.await
	}

	async fn search_text_inner(&self, req: TextSearchRequest) -> Result<AccessPage> {
		let cfg = &self.cfg.search;
		let query = req.query.trim();

		if query.is_empty() {
			return Err(Error::invalid("query must not be empty."));
		}

		let limit = req.limit.unwrap_or(cfg.default_limit);

		self.check_limit(limit)?;

		if req.offset > MAX_OFFSET {
			return Err(Error::invalid(format!("offset must not exceed {MAX_OFFSET}.")));
		}

		let score_threshold = req.score_threshold.unwrap_or(cfg.default_score_threshold);

		if !score_threshold.is_finite() || !(0.0..=1.0).contains(&score_threshold) {
			return Err(Error::invalid("score_threshold must be in the range 0.0-1.0."));
		}

		let vector = self.embed(&normalize::normalize_query(query, &cfg.normalizer)).await?;

		if classify::looks_like_person_name(query, &cfg.classifier) {
			let hits = self
				.backends
				.vectors
				.search(VectorSearch {
					vector: vector.clone(),
					filter: Some(filter::person_name(query)),
					limit,
					offset: req.offset,
					score_threshold: Some(cfg.person_name_score_threshold),
				})
				.await?;

			if !hits.is_empty() {
				tracing::info!(hits = hits.len(), "Person-name search matched on the name fields.");

				let records = validate_all(hits.into_iter().map(|hit| hit.payload))?;

				return Ok(AccessPage::new(records, limit, SearchStrategy::PersonHybrid));
			}

			tracing::info!("Person-name search found nothing; falling back to vector search.");
		}

		let hits = self
			.backends
			.vectors
			.search(VectorSearch {
				vector,
				filter: None,
				limit,
				offset: req.offset,
				score_threshold: Some(score_threshold),
			})
			.await?;
		let records = validate_all(hits.into_iter().map(|hit| hit.payload))?;

		Ok(AccessPage::new(records, limit, SearchStrategy::Vector))
	}

	async fn search_filtered_inner(&self, query: SearchQuery) -> Result<AccessPage> {
		query.validate().map_err(Error::invalid)?;
		self.check_limit(query.limit)?;

		let predicate = filter::compile(&query);

		if let Some(text) = query.free_text() {
			let vector = self.embed(text).await?;
			let hits = self
				.backends
				.vectors
				.search(VectorSearch {
					vector,
					filter: predicate,
					limit: query.limit,
					offset: query.offset,
					score_threshold: None,
				})
				.await?;
			let records = validate_all(hits.into_iter().map(|hit| hit.payload))?;

			return Ok(AccessPage::new(records, query.limit, SearchStrategy::FilteredVector));
		}

		let payloads =
			self.backends.vectors.scroll(predicate.as_ref(), query.limit, query.offset).await?;
		let records = validate_all(payloads)?;

		Ok(AccessPage::new(records, query.limit, SearchStrategy::Scan))
	}

	fn check_limit(&self, limit: u32) -> Result<()> {
		let max = self.cfg.search.max_limit.min(MAX_LIMIT);

		if limit == 0 || limit > max {
			return Err(Error::invalid(format!("limit must be in the range 1-{max}.")));
		}

		Ok(())
	}
}

/// Every payload must be a well-formed record; one bad payload fails the whole page.
fn validate_all(payloads: impl IntoIterator<Item = Value>) -> Result<Vec<AccessRecord>> {
	payloads
		.into_iter()
		.map(|payload| {
			let record = AccessRecord::from_payload(payload)
				.map_err(|source| Error::Validation { schema: "AccessRecord", source })?;

			if !record.exit_follows_entry() {
				tracing::warn!(record = %record.id, "Access record exits before it enters.");
			}
			if !record.inside_flag_consistent() {
				tracing::warn!(
					record = %record.id,
					ainda_dentro = record.ainda_dentro,
					"Access record presence flag disagrees with its exit time."
				);
			}

			Ok(record)
		})
		.collect()
}

fn required(name: &str, value: &str) -> Result<()> {
	if value.trim().is_empty() {
		return Err(Error::invalid(format!("{name} must not be empty.")));
	}

	Ok(())
}
