use serde_json::json;
use time::macros::datetime;

use portaria_domain::{
	access::AccessRecord,
	classify,
	heatmap::{self, HeatmapFilters, HeatmapWindow, Region},
	token_ref::TokenRef,
	tracking::{self, LocationStep},
};

fn step(id: &str, latitude: f64, longitude: f64, speed_kmh: f64) -> LocationStep {
	LocationStep::from_document(
		id,
		&portaria_testkit::step_document(json!("tokens/T1"), latitude, longitude, speed_kmh),
		"tokens",
	)
}

fn window() -> HeatmapWindow {
	HeatmapWindow::ending_at(datetime!(2025-05-12 12:00 UTC), 7)
}

#[test]
fn classifier_recognizes_full_names() {
	let cfg = portaria_config::Classifier::default();

	assert!(classify::looks_like_person_name("NICOLAS MORAES SALVADOR", &cfg));
	assert!(!classify::looks_like_person_name("MORADOR APT 236", &cfg));
	assert!(!classify::looks_like_person_name("JOAO", &cfg));
}

#[test]
fn every_reference_shape_canonicalizes_to_the_same_id() {
	let shapes = [
		json!({ "type": "firestore/documentReference/1.0", "referencePath": "tokens/ABC123" }),
		json!("tokens/ABC123"),
		json!("ABC123"),
	];

	for shape in shapes {
		let token = TokenRef::from_value(shape);

		assert_eq!(token.canonical_id("tokens"), Ok("ABC123".to_string()));
	}
}

#[test]
fn one_dense_cell_yields_one_hotspot() {
	let cfg = portaria_config::Heatmap::default();
	let steps = vec![
		step("a", -22.90001, -47.06001, 0.0),
		step("b", -22.90002, -47.06002, 2.0),
		step("c", -22.90003, -47.06003, 10.0),
		step("d", -22.90004, -47.06004, 0.5),
		step("e", -22.95001, -47.10001, 0.0),
		step("f", -22.95002, -47.10002, 0.0),
	];
	let result = heatmap::aggregate(&steps, window(), 100, &HeatmapFilters::default(), &cfg);

	assert_eq!(result.total_points, 6);
	assert_eq!(result.hotspots.len(), 1);

	let hotspot = &result.hotspots[0];

	assert_eq!(hotspot.count, 4);
	assert!((hotspot.intensity - (3.0 + 2.0 + 1.0 + 3.0) / 4.0).abs() < 1e-9);
	assert!((hotspot.latitude - -22.900025).abs() < 1e-9);
	assert!(!result.degraded);
}

#[test]
fn cells_at_the_threshold_are_not_hotspots() {
	let cfg = portaria_config::Heatmap::default();
	let steps =
		(0..3).map(|i| step(&i.to_string(), -22.90001, -47.06001, 0.0)).collect::<Vec<_>>();
	let result = heatmap::aggregate(&steps, window(), 100, &HeatmapFilters::default(), &cfg);

	assert!(result.hotspots.is_empty());
}

#[test]
fn max_records_caps_accepted_points() {
	let cfg = portaria_config::Heatmap::default();
	let mut steps = vec![step("invalid", 0.0, 0.0, 0.0)];

	steps.extend((0..10).map(|i| step(&i.to_string(), -22.9, -47.06, 0.0)));

	let result = heatmap::aggregate(&steps, window(), 4, &HeatmapFilters::default(), &cfg);

	assert_eq!(result.total_points, 4);
	assert_eq!(result.points[0].latitude, -22.9);
}

#[test]
fn filters_exclude_before_weighting() {
	let cfg = portaria_config::Heatmap::default();
	let steps = vec![
		step("slow", -22.9, -47.06, 0.0),
		step("fast", -22.9, -47.06, 40.0),
		step("far", -10.0, -40.0, 0.0),
	];
	let filters = HeatmapFilters {
		token_ids: vec!["T1".to_string()],
		max_speed: Some(20.0),
		region: Some(Region { lat_min: -23.0, lat_max: -22.0, lng_min: -48.0, lng_max: -47.0 }),
		..HeatmapFilters::default()
	};
	let result = heatmap::aggregate(&steps, window(), 100, &filters, &cfg);

	assert_eq!(result.total_points, 1);
	assert_eq!(result.points[0].weight, 3);

	let other_token =
		HeatmapFilters { token_ids: vec!["T2".to_string()], ..HeatmapFilters::default() };

	assert_eq!(heatmap::aggregate(&steps, window(), 100, &other_token, &cfg).total_points, 0);
}

#[test]
fn hotspots_are_ordered_by_count_and_truncated() {
	let cfg = portaria_config::Heatmap { max_hotspots: 2, ..portaria_config::Heatmap::default() };
	let mut steps = Vec::new();

	for (cell, count) in [(0, 4), (1, 6), (2, 5)] {
		let latitude = -22.9 + f64::from(cell) * 0.01;

		steps.extend((0..count).map(|i| step(&format!("{cell}-{i}"), latitude, -47.06, 0.0)));
	}

	let result = heatmap::aggregate(&steps, window(), 100, &HeatmapFilters::default(), &cfg);
	let counts = result.hotspots.iter().map(|hotspot| hotspot.count).collect::<Vec<_>>();

	assert_eq!(counts, vec![6, 5]);
}

#[test]
fn steps_sort_ascending_with_untimed_first() {
	let mut steps = vec![
		LocationStep::from_document(
			"late",
			&json!({ "timestamp": "2025-05-12T10:00:00Z" }),
			"tokens",
		),
		LocationStep::from_document("untimed", &json!({}), "tokens"),
		LocationStep::from_document(
			"early",
			&json!({ "last_updated": { "_seconds": 1_746_000_000, "_nanoseconds": 0 } }),
			"tokens",
		),
	];

	tracking::sort_steps(&mut steps);

	let ids = steps.iter().map(|step| step.id.as_str()).collect::<Vec<_>>();

	assert_eq!(ids, vec!["untimed", "early", "late"]);
}

#[test]
fn access_record_round_trips_without_field_loss() {
	let payload = portaria_testkit::access_record_payload("rec-1", "ALECSANDER SILVA");
	let record = AccessRecord::from_payload(payload).expect("Payload must validate.");

	assert_eq!(record.original_record.veiculo.placa.as_deref(), Some("ABC1D23"));
	assert!(record.exit_follows_entry());
	assert!(record.inside_flag_consistent());

	let reparsed = AccessRecord::from_payload(serde_json::to_value(&record).unwrap()).unwrap();

	assert_eq!(reparsed, record);
}

#[test]
fn access_record_missing_required_field_fails() {
	let mut payload = portaria_testkit::access_record_payload("rec-1", "ALECSANDER SILVA");

	payload.as_object_mut().unwrap().remove("pessoa_documento");

	assert!(AccessRecord::from_payload(payload).is_err());
}
