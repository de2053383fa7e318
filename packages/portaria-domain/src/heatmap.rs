//! Grid aggregation of location pings into weighted points and hotspots.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime, Time};

use crate::tracking::LocationStep;

/// Widest window a heatmap may cover.
pub const MAX_WINDOW_DAYS: u32 = 3660;

/// Inclusive whole-day window ending on the current day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeatmapWindow {
	#[serde(serialize_with = "crate::time_serde::serialize")]
	pub start: OffsetDateTime,
	#[serde(serialize_with = "crate::time_serde::serialize")]
	pub end: OffsetDateTime,
}
impl HeatmapWindow {
	/// Midnight of `now - days` through the last millisecond of `now`'s day. `days` is
	/// capped at [`MAX_WINDOW_DAYS`].
	pub fn ending_at(now: OffsetDateTime, days: u32) -> Self {
		let days = Duration::days(i64::from(days.min(MAX_WINDOW_DAYS)));
		let start = now.checked_sub(days).unwrap_or(now).replace_time(Time::MIDNIGHT);
		let end = now.replace_time(Time::MIDNIGHT) + Duration::days(1) - Duration::milliseconds(1);

		Self { start, end }
	}

	/// Zero-width window at `now`, reported when the aggregation could not run.
	pub fn degenerate(now: OffsetDateTime) -> Self {
		Self { start: now, end: now }
	}
}

/// Latitude/longitude bounding box, inclusive on every edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
	pub lat_min: f64,
	pub lat_max: f64,
	pub lng_min: f64,
	pub lng_max: f64,
}
impl Region {
	pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
		(self.lat_min..=self.lat_max).contains(&latitude)
			&& (self.lng_min..=self.lng_max).contains(&longitude)
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeatmapFilters {
	#[serde(default)]
	pub token_ids: Vec<String>,
	#[serde(default)]
	pub user_ids: Vec<String>,
	#[serde(default)]
	pub min_speed: Option<f64>,
	#[serde(default)]
	pub max_speed: Option<f64>,
	#[serde(default)]
	pub region: Option<Region>,
}
impl HeatmapFilters {
	fn accepts(&self, step: &LocationStep, latitude: f64, longitude: f64, speed: f64) -> bool {
		if !self.token_ids.is_empty() && !matches_any(&self.token_ids, step.token_id.as_deref()) {
			return false;
		}
		if !self.user_ids.is_empty() && !matches_any(&self.user_ids, step.user_id.as_deref()) {
			return false;
		}
		if self.min_speed.is_some_and(|min| speed < min) {
			return false;
		}
		if self.max_speed.is_some_and(|max| speed > max) {
			return false;
		}
		if self.region.is_some_and(|region| !region.contains(latitude, longitude)) {
			return false;
		}

		true
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapPoint {
	pub latitude: f64,
	pub longitude: f64,
	pub weight: u8,
	#[serde(serialize_with = "crate::time_serde::option::serialize")]
	pub timestamp: Option<OffsetDateTime>,
	pub token_id: Option<String>,
	pub user_id: Option<String>,
	pub speed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hotspot {
	/// Centroid of the points that fell into the cell.
	pub latitude: f64,
	pub longitude: f64,
	/// Mean point weight in the cell.
	pub intensity: f64,
	pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapResult {
	pub points: Vec<HeatmapPoint>,
	pub total_points: usize,
	pub date_range: HeatmapWindow,
	pub hotspots: Vec<Hotspot>,
	/// Set when the step read failed and the result is empty for that reason.
	pub degraded: bool,
}
impl HeatmapResult {
	pub fn degraded(now: OffsetDateTime) -> Self {
		Self {
			points: Vec::new(),
			total_points: 0,
			date_range: HeatmapWindow::degenerate(now),
			hotspots: Vec::new(),
			degraded: true,
		}
	}
}

#[derive(Debug, Default)]
struct Cell {
	count: usize,
	weight_sum: u32,
	latitude_sum: f64,
	longitude_sum: f64,
}

/// Dwell weight: near-stationary points dominate.
pub fn speed_weight(speed: f64) -> u8 {
	if speed < 1.0 {
		3
	} else if speed < 5.0 {
		2
	} else {
		1
	}
}

/// Single pass over `steps` in input order. Steps without a valid position or rejected
/// by `filters` are skipped; processing stops once `max_records` points are accepted.
pub fn aggregate(
	steps: &[LocationStep],
	window: HeatmapWindow,
	max_records: usize,
	filters: &HeatmapFilters,
	cfg: &portaria_config::Heatmap,
) -> HeatmapResult {
	let mut points = Vec::new();
	let mut cells: Vec<((i64, i64), Cell)> = Vec::new();
	let mut cell_index: HashMap<(i64, i64), usize> = HashMap::new();

	for step in steps {
		if points.len() >= max_records {
			break;
		}

		let Some((latitude, longitude)) = step.position() else {
			continue;
		};
		let speed = step.speed_kmh.filter(|speed| speed.is_finite()).unwrap_or(0.0);

		if !filters.accepts(step, latitude, longitude, speed) {
			continue;
		}

		let weight = speed_weight(speed);
		let key = (
			(latitude / cfg.cell_size_degrees).floor() as i64,
			(longitude / cfg.cell_size_degrees).floor() as i64,
		);
		let index = *cell_index.entry(key).or_insert_with(|| {
			cells.push((key, Cell::default()));

			cells.len() - 1
		});
		let cell = &mut cells[index].1;

		cell.count += 1;
		cell.weight_sum += u32::from(weight);
		cell.latitude_sum += latitude;
		cell.longitude_sum += longitude;

		points.push(HeatmapPoint {
			latitude,
			longitude,
			weight,
			timestamp: step.timestamp,
			token_id: step.token_id.clone(),
			user_id: step.user_id.clone(),
			speed,
		});
	}

	let mut hotspots: Vec<Hotspot> = cells
		.into_iter()
		.map(|(_, cell)| cell)
		.filter(|cell| cell.count > cfg.hotspot_min_points)
		.map(|cell| {
			let count = cell.count as f64;

			Hotspot {
				latitude: cell.latitude_sum / count,
				longitude: cell.longitude_sum / count,
				intensity: f64::from(cell.weight_sum) / count,
				count: cell.count,
			}
		})
		.collect();

	hotspots.sort_by(|a, b| b.count.cmp(&a.count));
	hotspots.truncate(cfg.max_hotspots);

	HeatmapResult {
		total_points: points.len(),
		points,
		date_range: window,
		hotspots,
		degraded: false,
	}
}

fn matches_any(allowed: &[String], value: Option<&str>) -> bool {
	value.is_some_and(|value| allowed.iter().any(|candidate| candidate == value))
}
