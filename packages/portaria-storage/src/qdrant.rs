use std::collections::HashMap;

use qdrant_client::qdrant::{
	Condition, CountPointsBuilder, DatetimeRange, Distance, Filter, MinShould, PointId, Query,
	QueryPointsBuilder, ScrollPointsBuilder, Timestamp, Value, value::Kind, vectors_config,
};
use serde::Serialize;
use time::{
	OffsetDateTime, PrimitiveDateTime, format_description::well_known::Rfc3339,
	macros::format_description,
};

use portaria_domain::predicate::{ExactValue, FilterPredicate};

use crate::{Error, Result};

const SCROLL_PAGE_SIZE: u32 = 256;

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &portaria_config::Qdrant) -> Result<Self> {
		let client =
			qdrant_client::Qdrant::from_url(&cfg.url).api_key(cfg.api_key.clone()).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Nearest-neighbour search returning payloads and scores in rank order.
	pub async fn search(&self, request: VectorSearch) -> Result<Vec<ScoredPayload>> {
		let mut search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(request.vector))
			.limit(u64::from(request.limit))
			.offset(u64::from(request.offset))
			.with_payload(true);

		if let Some(filter) = request.filter.as_ref() {
			search = search.filter(to_qdrant_filter(filter)?);
		}
		if let Some(threshold) = request.score_threshold {
			search = search.score_threshold(threshold);
		}

		let response = self.client.query(search).await?;

		Ok(response
			.result
			.into_iter()
			.map(|point| ScoredPayload {
				payload: payload_to_json(point.payload),
				score: point.score,
			})
			.collect())
	}

	/// Filter-only scan in point-id order, skipping the first `offset` matches. Skipped
	/// points are counted off page by page and never buffered.
	pub async fn scroll(
		&self,
		filter: Option<&FilterPredicate>,
		limit: u32,
		offset: u32,
	) -> Result<Vec<serde_json::Value>> {
		let filter = filter.map(to_qdrant_filter).transpose()?;
		let limit = limit as usize;
		let mut to_skip = offset as usize;
		let mut payloads = Vec::with_capacity(limit.min(SCROLL_PAGE_SIZE as usize));
		let mut page_offset: Option<PointId> = None;

		while payloads.len() < limit {
			let outstanding = to_skip + (limit - payloads.len());
			let page_limit = outstanding.min(SCROLL_PAGE_SIZE as usize) as u32;
			let mut scroll = ScrollPointsBuilder::new(self.collection.clone())
				.limit(page_limit)
				.with_payload(true)
				.with_vectors(false);

			if let Some(filter) = filter.as_ref() {
				scroll = scroll.filter(filter.clone());
			}
			if let Some(point_id) = page_offset.take() {
				scroll = scroll.offset(point_id);
			}

			let response = self.client.scroll(scroll).await?;

			for point in response.result {
				if to_skip > 0 {
					to_skip -= 1;

					continue;
				}
				if payloads.len() == limit {
					break;
				}

				payloads.push(payload_to_json(point.payload));
			}

			match response.next_page_offset {
				Some(next) => page_offset = Some(next),
				None => break,
			}
		}

		Ok(payloads)
	}

	pub async fn collection_status(&self) -> Result<CollectionStatus> {
		let health = self.client.health_check().await?;
		let mut status = CollectionStatus {
			server_version: Some(health.version),
			collection: self.collection.clone(),
			exists: false,
			points_count: None,
			vector_size: None,
			distance: None,
		};

		if !self.client.collection_exists(self.collection.clone()).await? {
			return Ok(status);
		}

		status.exists = true;

		let info = self.client.collection_info(self.collection.clone()).await?;
		let params = info
			.result
			.and_then(|info| info.config)
			.and_then(|config| config.params)
			.and_then(|params| params.vectors_config)
			.and_then(|vectors| vectors.config);

		if let Some(vectors_config::Config::Params(params)) = params {
			status.vector_size = Some(params.size);
			status.distance = Distance::try_from(params.distance)
				.ok()
				.map(|distance| distance.as_str_name().to_string());
		}

		let count =
			self.client.count(CountPointsBuilder::new(self.collection.clone()).exact(true)).await?;

		status.points_count = count.result.map(|result| result.count);

		Ok(status)
	}
}

#[derive(Debug, Clone)]
pub struct VectorSearch {
	pub vector: Vec<f32>,
	pub filter: Option<FilterPredicate>,
	pub limit: u32,
	pub offset: u32,
	pub score_threshold: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPayload {
	pub payload: serde_json::Value,
	pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionStatus {
	pub server_version: Option<String>,
	pub collection: String,
	pub exists: bool,
	pub points_count: Option<u64>,
	pub vector_size: Option<u64>,
	pub distance: Option<String>,
}

pub fn to_qdrant_filter(predicate: &FilterPredicate) -> Result<Filter> {
	match predicate {
		FilterPredicate::And(children) => Ok(Filter::must(conditions(children)?)),
		FilterPredicate::Or(children) => Ok(any_of(conditions(children)?)),
		leaf => Ok(Filter::must([to_condition(leaf)?])),
	}
}

fn to_condition(predicate: &FilterPredicate) -> Result<Condition> {
	match predicate {
		FilterPredicate::And(children) => Ok(Condition::from(Filter::must(conditions(children)?))),
		FilterPredicate::Or(children) => Ok(Condition::from(any_of(conditions(children)?))),
		FilterPredicate::Exact { field, value: ExactValue::Keyword(value) } =>
			Ok(Condition::matches(field.as_str(), value.clone())),
		FilterPredicate::Exact { field, value: ExactValue::Bool(value) } =>
			Ok(Condition::matches(field.as_str(), *value)),
		FilterPredicate::Text { field, text } =>
			Ok(Condition::matches_text(field.as_str(), text.as_str())),
		FilterPredicate::Range { field, gte, lte } => {
			let gte = gte.as_deref().map(|raw| parse_bound(field, raw)).transpose()?;
			let lte = lte.as_deref().map(|raw| parse_bound(field, raw)).transpose()?;

			if gte.is_none() && lte.is_none() {
				return Err(Error::InvalidArgument(format!("Range on {field} has no bounds.")));
			}

			Ok(Condition::datetime_range(
				field.as_str(),
				DatetimeRange { lt: None, gt: None, gte, lte },
			))
		},
	}
}

fn conditions(children: &[FilterPredicate]) -> Result<Vec<Condition>> {
	children.iter().map(to_condition).collect()
}

fn any_of(conditions: Vec<Condition>) -> Filter {
	Filter {
		must: Vec::new(),
		should: Vec::new(),
		must_not: Vec::new(),
		min_should: Some(MinShould { min_count: 1, conditions }),
	}
}

/// Accepts RFC 3339 or a bare `YYYY-MM-DDTHH:MM:SS`, which is read as UTC.
fn parse_bound(field: &str, raw: &str) -> Result<Timestamp> {
	let parsed = OffsetDateTime::parse(raw, &Rfc3339).or_else(|_| {
		PrimitiveDateTime::parse(
			raw,
			format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
		)
		.map(PrimitiveDateTime::assume_utc)
	});
	let ts = parsed.map_err(|_| {
		Error::InvalidArgument(format!("Range bound {raw:?} on {field} is not a date-time."))
	})?;

	Ok(Timestamp { seconds: ts.unix_timestamp(), nanos: ts.nanosecond() as i32 })
}

pub fn payload_to_json(payload: HashMap<String, Value>) -> serde_json::Value {
	serde_json::Value::Object(
		payload.into_iter().map(|(key, value)| (key, value_to_json(value))).collect(),
	)
}

fn value_to_json(value: Value) -> serde_json::Value {
	match value.kind {
		None | Some(Kind::NullValue(_)) => serde_json::Value::Null,
		Some(Kind::BoolValue(value)) => serde_json::Value::Bool(value),
		Some(Kind::IntegerValue(value)) => serde_json::Value::from(value),
		Some(Kind::DoubleValue(value)) => serde_json::Number::from_f64(value)
			.map(serde_json::Value::Number)
			.unwrap_or(serde_json::Value::Null),
		Some(Kind::StringValue(value)) => serde_json::Value::String(value),
		Some(Kind::ListValue(list)) =>
			serde_json::Value::Array(list.values.into_iter().map(value_to_json).collect()),
		Some(Kind::StructValue(object)) => payload_to_json(object.fields),
	}
}
