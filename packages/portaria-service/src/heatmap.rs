use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use portaria_domain::{
	heatmap::{self, HeatmapFilters, HeatmapResult, HeatmapWindow, MAX_WINDOW_DAYS},
	tracking::LocationStep,
};
use portaria_storage::firestore::{FieldFilter, FieldOp, FieldValue};

use crate::{Error, PortariaService, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeatmapRequest {
	#[serde(default)]
	pub window_days: Option<u32>,
	#[serde(default)]
	pub max_records: Option<usize>,
	#[serde(default, flatten)]
	pub filters: HeatmapFilters,
}

impl PortariaService {
	pub async fn heatmap(&self, req: HeatmapRequest) -> Result<HeatmapResult> {
		self.heatmap_at(req, OffsetDateTime::now_utc()).await
	}

	/// Heatmap over the whole days ending on `now`'s day. A failed step read yields an
	/// empty result flagged `degraded` instead of an error; only invalid requests fail.
	pub async fn heatmap_at(
		&self,
		req: HeatmapRequest,
		now: OffsetDateTime,
	) -> Result<HeatmapResult> {
		let cfg = &self.cfg.heatmap;
		let window_days = req.window_days.unwrap_or(cfg.default_window_days);
		let max_records = req.max_records.unwrap_or(cfg.default_max_records);

		if window_days == 0 || window_days > MAX_WINDOW_DAYS {
			return Err(Error::invalid(format!(
				"window_days must be in the range 1-{MAX_WINDOW_DAYS}."
			)));
		}
		if max_records == 0 {
			return Err(Error::invalid("max_records must be greater than zero."));
		}
		if let Some(region) = req.filters.region
			&& (region.lat_min > region.lat_max || region.lng_min > region.lng_max)
		{
			return Err(Error::invalid("region minimums must not exceed maximums."));
		}

		let window = HeatmapWindow::ending_at(now, window_days);
		let filters = [
			FieldFilter::new(
				"last_updated",
				FieldOp::GreaterThanOrEqual,
				FieldValue::Timestamp(window.start),
			),
			FieldFilter::new(
				"last_updated",
				FieldOp::LessThanOrEqual,
				FieldValue::Timestamp(window.end),
			),
		];
		let tokens_collection = &self.cfg.tracking.tokens_collection;
		let docs = match self
			.backends
			.documents
			.query(&self.cfg.tracking.steps_collection, &filters, None)
			.await
		{
			Ok(docs) => docs,
			Err(err) => {
				tracing::error!(error = %err, "Heatmap step read failed; returning empty heatmap.");

				return Ok(HeatmapResult::degraded(now));
			},
		};
		let steps = docs
			.iter()
			.map(|doc| LocationStep::from_document(&doc.id, &doc.data, tokens_collection))
			.collect::<Vec<_>>();
		let result = heatmap::aggregate(&steps, window, max_records, &req.filters, cfg);

		tracing::info!(
			steps = steps.len(),
			points = result.total_points,
			hotspots = result.hotspots.len(),
			"Built heatmap."
		);

		Ok(result)
	}
}
