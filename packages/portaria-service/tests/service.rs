use std::{
	collections::HashMap,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};

use serde_json::{Value, json};
use time::macros::datetime;

use portaria_config::{Config, EmbeddingProviderConfig};
use portaria_domain::{
	access::SearchQuery, predicate::FilterPredicate, tracking::LocationStep,
};
use portaria_service::{
	Backends, BoxFuture, DocumentStore, EmbeddingProvider, Error, HeatmapRequest, PortariaService,
	ResolvedVia, Result, TextSearchRequest, VectorIndex, search::SearchStrategy,
};
use portaria_storage::{
	firestore::{FieldFilter, FieldValue, REFERENCE_TYPE, StoredDocument},
	qdrant::{CollectionStatus, ScoredPayload, VectorSearch},
};

fn unavailable() -> Error {
	Error::BackendUnavailable {
		source: portaria_storage::Error::Firestore {
			status: 503,
			message: "unavailable".to_string(),
		},
	}
}

struct SpyEmbedding {
	calls: Arc<AtomicUsize>,
}
impl SpyEmbedding {
	fn new() -> Self {
		Self { calls: Arc::new(AtomicUsize::new(0)) }
	}
}
impl EmbeddingProvider for SpyEmbedding {
	fn embed_query<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		_text: &'a str,
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let vector = vec![0.5; cfg.dimensions as usize];

		Box::pin(async move { Ok(vector) })
	}
}

/// Answers searches from a queue, one response per call, and records every request.
#[derive(Default)]
struct SpyIndex {
	responses: Mutex<Vec<Result<Vec<ScoredPayload>>>>,
	searches: Mutex<Vec<VectorSearch>>,
	scrolled: Mutex<Vec<(Option<FilterPredicate>, u32, u32)>>,
	scroll_payloads: Vec<Value>,
	status_fails: bool,
}
impl SpyIndex {
	fn answering(responses: Vec<Vec<Value>>) -> Self {
		let responses = responses
			.into_iter()
			.rev()
			.map(|payloads| {
				Ok(payloads
					.into_iter()
					.map(|payload| ScoredPayload { payload, score: 0.9 })
					.collect())
			})
			.collect();

		Self { responses: Mutex::new(responses), ..Self::default() }
	}

	fn failing() -> Self {
		Self { responses: Mutex::new(vec![Err(unavailable())]), ..Self::default() }
	}

	fn searches(&self) -> Vec<VectorSearch> {
		self.searches.lock().unwrap().clone()
	}
}
impl VectorIndex for SpyIndex {
	fn search<'a>(&'a self, request: VectorSearch) -> BoxFuture<'a, Result<Vec<ScoredPayload>>> {
		self.searches.lock().unwrap().push(request);

		let response = self.responses.lock().unwrap().pop().unwrap_or_else(|| Ok(Vec::new()));

		Box::pin(async move { response })
	}

	fn scroll<'a>(
		&'a self,
		filter: Option<&'a FilterPredicate>,
		limit: u32,
		offset: u32,
	) -> BoxFuture<'a, Result<Vec<Value>>> {
		self.scrolled.lock().unwrap().push((filter.cloned(), limit, offset));

		let payloads = self.scroll_payloads.clone();

		Box::pin(async move { Ok(payloads) })
	}

	fn status<'a>(&'a self) -> BoxFuture<'a, Result<CollectionStatus>> {
		let status = if self.status_fails {
			Err(unavailable())
		} else {
			Ok(CollectionStatus {
				server_version: Some("1.16.0".to_string()),
				collection: "acessos_condominio".to_string(),
				exists: true,
				points_count: Some(42),
				vector_size: Some(4),
				distance: Some("Cosine".to_string()),
			})
		};

		Box::pin(async move { status })
	}
}

/// Serves `users`, `tokens`, and `tokenSteps` from memory. Direct step lookups are keyed by
/// the reference path; references listed in `failing_refs` fail. When `assigned` is set,
/// token lookups are keyed by the assigned user's path.
#[derive(Default)]
struct SpyStore {
	users: Vec<StoredDocument>,
	tokens: Vec<StoredDocument>,
	assigned: HashMap<String, Vec<StoredDocument>>,
	steps: Vec<StoredDocument>,
	direct: HashMap<String, Vec<StoredDocument>>,
	failing_refs: Vec<String>,
	steps_fail: bool,
	queries: Mutex<Vec<(String, Vec<FieldFilter>)>>,
	lists: AtomicUsize,
}
impl SpyStore {
	fn queries(&self) -> Vec<(String, Vec<FieldFilter>)> {
		self.queries.lock().unwrap().clone()
	}
}
impl DocumentStore for SpyStore {
	fn get<'a>(
		&'a self,
		_collection: &'a str,
		_id: &'a str,
	) -> BoxFuture<'a, Result<Option<StoredDocument>>> {
		Box::pin(async move { Ok(None) })
	}

	fn list<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<Vec<StoredDocument>>> {
		self.lists.fetch_add(1, Ordering::SeqCst);

		let result = match collection {
			"tokenSteps" if self.steps_fail => Err(unavailable()),
			"tokenSteps" => Ok(self.steps.clone()),
			_ => Ok(Vec::new()),
		};

		Box::pin(async move { result })
	}

	fn query<'a>(
		&'a self,
		collection: &'a str,
		filters: &'a [FieldFilter],
		_limit: Option<u32>,
	) -> BoxFuture<'a, Result<Vec<StoredDocument>>> {
		self.queries.lock().unwrap().push((collection.to_string(), filters.to_vec()));

		let result = match (collection, filters.first().map(|filter| &filter.value)) {
			("users", _) => Ok(self.users.clone()),
			("tokens", Some(FieldValue::Reference(path))) if !self.assigned.is_empty() =>
				Ok(self.assigned.get(path).cloned().unwrap_or_default()),
			("tokens", _) => Ok(self.tokens.clone()),
			("tokenSteps", Some(FieldValue::Reference(path))) =>
				if self.failing_refs.contains(path) {
					Err(unavailable())
				} else {
					Ok(self.direct.get(path).cloned().unwrap_or_default())
				},
			("tokenSteps", _) if self.steps_fail => Err(unavailable()),
			("tokenSteps", _) => Ok(self.steps.clone()),
			_ => Ok(Vec::new()),
		};

		Box::pin(async move { result })
	}
}

fn config() -> Config {
	portaria_testkit::sample_config().expect("Sample config must load.")
}

fn with_spies(
	vectors: SpyIndex,
	documents: SpyStore,
) -> (PortariaService, Arc<SpyIndex>, Arc<SpyStore>) {
	with_config(config(), vectors, documents)
}

fn with_config(
	cfg: Config,
	vectors: SpyIndex,
	documents: SpyStore,
) -> (PortariaService, Arc<SpyIndex>, Arc<SpyStore>) {
	let vectors = Arc::new(vectors);
	let documents = Arc::new(documents);
	let backends =
		Backends::new(Arc::new(SpyEmbedding::new()), vectors.clone(), documents.clone());

	(PortariaService::with_backends(cfg, backends), vectors, documents)
}

fn record(id: &str, name: &str) -> Value {
	portaria_testkit::access_record_payload(id, name)
}

fn doc(collection: &str, id: &str, data: Value) -> StoredDocument {
	StoredDocument { id: id.to_string(), path: format!("{collection}/{id}"), data }
}

fn reference(path: &str) -> Value {
	json!({ "type": REFERENCE_TYPE, "referencePath": path })
}

fn step_doc(id: &str, token_ref: Value, timestamp: &str) -> StoredDocument {
	let mut data = portaria_testkit::step_document(token_ref, -22.9, -47.06, 0.0);

	data["timestamp"] = json!(timestamp);

	doc("tokenSteps", id, data)
}

/// Fields referenced anywhere in `predicate`, in visit order.
fn filter_fields(predicate: &FilterPredicate) -> Vec<&str> {
	match predicate {
		FilterPredicate::And(children) | FilterPredicate::Or(children) =>
			children.iter().flat_map(filter_fields).collect(),
		FilterPredicate::Exact { field, .. }
		| FilterPredicate::Text { field, .. }
		| FilterPredicate::Range { field, .. } => vec![field.as_str()],
	}
}

fn step_ids(steps: &[LocationStep]) -> Vec<&str> {
	steps.iter().map(|step| step.id.as_str()).collect()
}

fn text_request(query: &str, limit: u32) -> TextSearchRequest {
	TextSearchRequest {
		query: query.to_string(),
		limit: Some(limit),
		offset: 0,
		score_threshold: None,
	}
}

#[tokio::test]
async fn person_name_hit_never_falls_through() {
	let index = SpyIndex::answering(vec![vec![record("rec-1", "ALECSANDER SILVA")]]);
	let (service, index, _) = with_spies(index, SpyStore::default());
	let page = service.search_text(text_request("Alecsander Silva", 5)).await.unwrap();

	assert_eq!(page.strategy, SearchStrategy::PersonHybrid);
	assert_eq!(page.total, 1);
	assert!(!page.has_more);

	let searches = index.searches();

	assert_eq!(searches.len(), 1);
	assert_eq!(searches[0].score_threshold, Some(0.5));
	assert_eq!(searches[0].limit, 5);
	assert_eq!(
		searches[0].filter.as_ref().map(filter_fields),
		Some(vec!["pessoa_nome", "original_record.busca_otimizada.nomes_relacionados"])
	);
}

#[tokio::test]
async fn person_name_miss_falls_back_to_unfiltered_search() {
	let index = SpyIndex::answering(vec![vec![], vec![record("rec-9", "OUTRA PESSOA")]]);
	let (service, index, _) = with_spies(index, SpyStore::default());
	let page = service.search_text(text_request("ALECSANDER SILVA", 5)).await.unwrap();

	assert_eq!(page.strategy, SearchStrategy::Vector);
	assert_eq!(page.records[0].id, "rec-9");

	let searches = index.searches();

	assert_eq!(searches.len(), 2);
	assert!(searches[1].filter.is_none());
	assert_eq!(searches[1].score_threshold, Some(0.55));
}

#[tokio::test]
async fn resident_queries_skip_the_person_path() {
	let index = SpyIndex::answering(vec![vec![record("rec-1", "ANA")]]);
	let (service, index, _) = with_spies(index, SpyStore::default());
	let mut req = text_request("MORADOR APT 236", 1);

	req.score_threshold = Some(0.7);

	let page = service.search_text(req).await.unwrap();

	assert_eq!(page.strategy, SearchStrategy::Vector);
	assert!(page.has_more);

	let searches = index.searches();

	assert_eq!(searches.len(), 1);
	assert!(searches[0].filter.is_none());
	assert_eq!(searches[0].score_threshold, Some(0.7));
}

#[tokio::test]
async fn one_malformed_payload_fails_the_page() {
	let mut broken = record("rec-2", "BRUNO");

	broken.as_object_mut().unwrap().remove("ainda_dentro");

	let index = SpyIndex::answering(vec![vec![record("rec-1", "ANA"), broken]]);
	let (service, _, _) = with_spies(index, SpyStore::default());
	let err = service.search_text(text_request("ENTREGA", 10)).await.unwrap_err();

	assert!(matches!(err, Error::Retrieval { operation: "search_text", .. }));
	assert!(matches!(err.root(), Error::Validation { schema: "AccessRecord", .. }));
}

#[tokio::test]
async fn inconsistent_records_are_still_returned() {
	let mut odd = record("rec-2", "BRUNO");
	let fields = odd.as_object_mut().unwrap();

	fields.insert("ainda_dentro".to_string(), json!(true));
	fields.insert("saida_datetime".to_string(), json!("2025-05-12T07:00:00"));

	let index = SpyIndex::answering(vec![vec![record("rec-1", "ANA"), odd]]);
	let (service, _, _) = with_spies(index, SpyStore::default());
	let page = service.search_text(text_request("ENTREGA", 10)).await.unwrap();

	assert_eq!(page.total, 2);
	assert!(!page.records[1].exit_follows_entry());
	assert!(!page.records[1].inside_flag_consistent());
}

#[tokio::test]
async fn backend_failures_keep_their_cause() {
	let (service, _, _) = with_spies(SpyIndex::failing(), SpyStore::default());
	let err = service.search_text(text_request("ENTREGA", 10)).await.unwrap_err();

	assert!(matches!(err.root(), Error::BackendUnavailable { .. }));
	assert!(err.to_string().starts_with("search_text failed"));
}

#[tokio::test]
async fn out_of_range_limits_are_rejected_before_any_call() {
	let (service, index, _) = with_spies(SpyIndex::default(), SpyStore::default());
	let err = service.search_text(text_request("ENTREGA", 101)).await.unwrap_err();

	assert!(matches!(err, Error::InvalidRequest { .. }));
	assert!(index.searches().is_empty());
}

#[tokio::test]
async fn oversized_offsets_are_rejected_before_any_scan() {
	let (service, index, _) = with_spies(SpyIndex::default(), SpyStore::default());
	let query =
		SearchQuery { ainda_dentro: Some(true), offset: u32::MAX, ..SearchQuery::default() };
	let err = service.search_filtered(query).await.unwrap_err();

	assert!(matches!(err, Error::InvalidRequest { .. }));
	assert!(index.scrolled.lock().unwrap().is_empty());

	let mut request = text_request("ENTREGA", 10);

	request.offset = u32::MAX;

	let err = service.search_text(request).await.unwrap_err();

	assert!(matches!(err, Error::InvalidRequest { .. }));
	assert!(index.searches().is_empty());
}

#[tokio::test]
async fn structured_only_queries_scan_with_the_compiled_filter() {
	let index = SpyIndex { scroll_payloads: vec![record("rec-3", "CAIO")], ..SpyIndex::default() };
	let (service, index, _) = with_spies(index, SpyStore::default());
	let query = SearchQuery {
		ainda_dentro: Some(true),
		limit: 3,
		offset: 6,
		..SearchQuery::default()
	};
	let page = service.search_filtered(query).await.unwrap();

	assert_eq!(page.strategy, SearchStrategy::Scan);
	assert!(index.searches().is_empty());

	let scrolled = index.scrolled.lock().unwrap().clone();

	assert_eq!(
		scrolled,
		vec![(Some(FilterPredicate::And(vec![FilterPredicate::flag("ainda_dentro", true)])), 3, 6)]
	);
}

#[tokio::test]
async fn free_text_with_fields_runs_a_filtered_vector_search() {
	let index = SpyIndex::answering(vec![vec![record("rec-4", "DANI")]]);
	let (service, index, _) = with_spies(index, SpyStore::default());
	let query = SearchQuery {
		query: Some("entrega de moveis".to_string()),
		veiculo_placa: Some("abc1d23".to_string()),
		..SearchQuery::default()
	};
	let page = service.search_filtered(query).await.unwrap();

	assert_eq!(page.strategy, SearchStrategy::FilteredVector);

	let searches = index.searches();

	assert_eq!(searches.len(), 1);
	assert_eq!(
		searches[0].filter.as_ref().map(filter_fields),
		Some(vec!["original_record.veiculo.placa"])
	);
	assert!(searches[0].score_threshold.is_none());
}

#[tokio::test]
async fn invalid_dates_are_rejected() {
	let (service, _, _) = with_spies(SpyIndex::default(), SpyStore::default());
	let err = service
		.person_history("12345678900", Some("12/05/2025".to_string()), None, None)
		.await
		.unwrap_err();

	assert!(matches!(err, Error::InvalidRequest { .. }));
}

#[tokio::test]
async fn direct_step_lookup_sorts_by_timestamp() {
	let store = SpyStore {
		direct: HashMap::from([(
			"tokens/ABC123".to_string(),
			vec![
				step_doc("late", reference("tokens/ABC123"), "2025-05-12T11:00:00Z"),
				step_doc("early", reference("tokens/ABC123"), "2025-05-12T09:00:00Z"),
			],
		)]),
		..SpyStore::default()
	};
	let (service, _, store) = with_spies(SpyIndex::default(), store);
	let resolved = service.resolve_steps(json!("/tokens/ABC123")).await.unwrap();

	assert_eq!(resolved.token_id, "ABC123");
	assert_eq!(resolved.resolved_via, ResolvedVia::Direct);
	assert_eq!(step_ids(&resolved.steps), vec!["early", "late"]);
	assert_eq!(store.lists.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_direct_lookup_falls_back_to_a_scan() {
	let store = SpyStore {
		steps: vec![
			step_doc("string-ref", json!("/tokens/ABC123"), "2025-05-12T10:00:00Z"),
			step_doc("object-ref", reference("tokens/ABC123"), "2025-05-12T09:00:00Z"),
			step_doc("other", json!("tokens/ZZZ"), "2025-05-12T08:00:00Z"),
		],
		..SpyStore::default()
	};
	let (service, _, store) = with_spies(SpyIndex::default(), store);
	let resolved = service.resolve_steps(reference("tokens/ABC123")).await.unwrap();

	assert_eq!(resolved.resolved_via, ResolvedVia::FallbackScan);
	assert_eq!(step_ids(&resolved.steps), vec!["object-ref", "string-ref"]);
	assert_eq!(store.lists.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unmatched_tokens_resolve_to_no_steps() {
	let (service, _, _) = with_spies(SpyIndex::default(), SpyStore::default());
	let resolved = service.resolve_steps(json!("NOPE")).await.unwrap();

	assert!(resolved.steps.is_empty());
	assert_eq!(resolved.resolved_via, ResolvedVia::FallbackScan);
}

#[tokio::test]
async fn unrecognized_references_are_lossy_or_rejected() {
	let (service, _, store) = with_spies(SpyIndex::default(), SpyStore::default());
	let resolved = service.resolve_steps(json!({ "id": 7 })).await.unwrap();

	assert!(resolved.lossy_reference);
	assert!(store.queries().is_empty());

	let mut cfg = config();

	cfg.tracking.strict_token_refs = true;

	let backends = Backends::new(
		Arc::new(SpyEmbedding::new()),
		Arc::new(SpyIndex::default()),
		Arc::new(SpyStore::default()),
	);
	let strict = PortariaService::with_backends(cfg, backends);
	let err = strict.resolve_steps(json!({ "id": 7 })).await.unwrap_err();

	assert!(matches!(err, Error::AmbiguousReference { .. }));
}

#[tokio::test]
async fn resolution_failures_name_the_token() {
	let store = SpyStore { failing_refs: vec!["tokens/T1".to_string()], ..SpyStore::default() };
	let (service, _, _) = with_spies(SpyIndex::default(), store);
	let err = service.resolve_steps(json!("T1")).await.unwrap_err();

	assert!(matches!(&err, Error::Resolution { token_id, .. } if token_id == "T1"));
	assert!(matches!(err.root(), Error::BackendUnavailable { .. }));
}

#[tokio::test]
async fn visitor_tracking_isolates_token_failures() {
	let store = SpyStore {
		users: vec![doc("users", "U1", json!({ "display_name": "ROSEMEIRE SANTOS" }))],
		tokens: vec![
			doc("tokens", "T1", json!({ "name": "Tag 1", "active": true })),
			doc("tokens", "T2", json!({ "name": "Tag 2", "active": true })),
		],
		direct: HashMap::from([(
			"tokens/T1".to_string(),
			vec![
				step_doc("s1", reference("tokens/T1"), "2025-05-12T09:00:00Z"),
				step_doc("s2", reference("tokens/T1"), "2025-05-12T09:05:00Z"),
			],
		)]),
		failing_refs: vec!["tokens/T2".to_string()],
		..SpyStore::default()
	};
	let (service, _, store) = with_spies(SpyIndex::default(), store);
	let tracking = service.visitor_tracking("rosemeire").await.unwrap();

	assert_eq!(tracking.total_tokens, 2);
	assert_eq!(tracking.steps_count, 2);

	let tokens = &tracking.visitors[0].tokens;

	assert_eq!(tokens[0].token.id, "T1");
	assert_eq!(tokens[0].resolved_via, Some(ResolvedVia::Direct));
	assert_eq!(tokens[1].token.id, "T2");
	assert!(tokens[1].steps.is_empty());
	assert!(tokens[1].error.is_some());

	let queries = store.queries();
	let (collection, filters) = &queries[0];

	assert_eq!(collection, "users");
	assert_eq!(filters[0].value, FieldValue::String("ROSEMEIRE".to_string()));
	assert_eq!(filters[1].value, FieldValue::String("ROSEMEIRE\u{f8ff}".to_string()));
	assert_eq!(queries[1].1[0].value, FieldValue::Reference("users/U1".to_string()));
}

#[tokio::test]
async fn every_matching_visitor_is_tracked() {
	let mut cfg = config();

	cfg.tracking.max_visitors = 2;

	let store = SpyStore {
		users: vec![
			doc("users", "U1", json!({ "display_name": "ANA LIMA" })),
			doc("users", "U2", json!({ "display_name": "ANA SOUZA" })),
		],
		assigned: HashMap::from([
			(
				"users/U1".to_string(),
				vec![doc("tokens", "T1", json!({ "name": "Tag 1", "active": true }))],
			),
			(
				"users/U2".to_string(),
				vec![
					doc("tokens", "T2", json!({ "name": "Tag 2", "active": true })),
					doc("tokens", "T3", json!({ "name": "Tag 3", "active": false })),
				],
			),
		]),
		direct: HashMap::from([
			(
				"tokens/T1".to_string(),
				vec![step_doc("s1", reference("tokens/T1"), "2025-05-12T09:00:00Z")],
			),
			(
				"tokens/T3".to_string(),
				vec![step_doc("s3", reference("tokens/T3"), "2025-05-12T10:00:00Z")],
			),
		]),
		..SpyStore::default()
	};
	let (service, _, store) = with_config(cfg, SpyIndex::default(), store);
	let tracking = service.visitor_tracking("ana").await.unwrap();
	let visitors = tracking
		.visitors
		.iter()
		.map(|tracked| {
			let tokens =
				tracked.tokens.iter().map(|token| token.token.id.as_str()).collect::<Vec<_>>();

			(tracked.visitor.uid.as_str(), tokens)
		})
		.collect::<Vec<_>>();

	assert_eq!(visitors, vec![("U1", vec!["T1"]), ("U2", vec!["T2", "T3"])]);
	assert_eq!(tracking.total_tokens, 3);
	assert_eq!(tracking.steps_count, 2);

	let token_lookups = store
		.queries()
		.into_iter()
		.filter(|(collection, _)| collection == "tokens")
		.count();

	assert_eq!(token_lookups, 2);
}

#[tokio::test]
async fn unknown_visitors_yield_an_empty_result() {
	let (service, _, _) = with_spies(SpyIndex::default(), SpyStore::default());
	let tracking = service.visitor_tracking("NINGUEM").await.unwrap();

	assert!(tracking.visitors.is_empty());
	assert_eq!(tracking.total_tokens, 0);
}

#[tokio::test]
async fn malformed_tokens_fail_validation() {
	let store = SpyStore {
		users: vec![doc("users", "U1", json!({ "display_name": "ANA" }))],
		tokens: vec![doc("tokens", "T1", json!({ "name": "Tag 1" }))],
		..SpyStore::default()
	};
	let (service, _, _) = with_spies(SpyIndex::default(), store);
	let err = service.visitor_tracking("ANA").await.unwrap_err();

	assert!(matches!(err.root(), Error::Validation { schema: "TrackingToken", .. }));
}

#[tokio::test]
async fn heatmap_reads_the_window_and_aggregates() {
	let steps = (0..5)
		.map(|i| {
			doc(
				"tokenSteps",
				&format!("s{i}"),
				portaria_testkit::step_document(reference("tokens/T1"), -22.9, -47.06, 0.0),
			)
		})
		.collect();
	let store = SpyStore { steps, ..SpyStore::default() };
	let (service, _, store) = with_spies(SpyIndex::default(), store);
	let now = datetime!(2025-05-12 15:30 UTC);
	let result = service.heatmap_at(HeatmapRequest::default(), now).await.unwrap();

	assert!(!result.degraded);
	assert_eq!(result.total_points, 5);
	assert_eq!(result.hotspots.len(), 1);
	assert_eq!(result.date_range.start, datetime!(2025-05-05 0:00 UTC));

	let queries = store.queries();
	let filters = &queries[0].1;

	assert_eq!(queries[0].0, "tokenSteps");
	assert_eq!(filters[0].field, "last_updated");
	assert_eq!(filters[0].value, FieldValue::Timestamp(datetime!(2025-05-05 0:00 UTC)));
}

#[tokio::test]
async fn heatmap_windows_beyond_the_cap_are_rejected() {
	let (service, _, store) = with_spies(SpyIndex::default(), SpyStore::default());
	let now = datetime!(2025-05-12 15:30 UTC);
	let req = HeatmapRequest { window_days: Some(u32::MAX), ..HeatmapRequest::default() };
	let err = service.heatmap_at(req, now).await.unwrap_err();

	assert!(matches!(err, Error::InvalidRequest { .. }));
	assert!(store.queries().is_empty());

	let req = HeatmapRequest { window_days: Some(3660), ..HeatmapRequest::default() };

	assert!(service.heatmap_at(req, now).await.is_ok());
}

#[tokio::test]
async fn heatmap_read_failures_degrade_instead_of_failing() {
	let store = SpyStore { steps_fail: true, ..SpyStore::default() };
	let (service, _, _) = with_spies(SpyIndex::default(), store);
	let now = datetime!(2025-05-12 15:30 UTC);
	let result = service.heatmap_at(HeatmapRequest::default(), now).await.unwrap();

	assert!(result.degraded);
	assert!(result.points.is_empty());
	assert_eq!(result.date_range.start, result.date_range.end);
}

#[tokio::test]
async fn connection_status_reports_instead_of_failing() {
	let (service, _, _) = with_spies(SpyIndex::default(), SpyStore::default());
	let status = service.connection_status().await;

	assert!(status.connected);
	assert_eq!(status.points_count, Some(42));

	let index = SpyIndex { status_fails: true, ..SpyIndex::default() };
	let (service, _, _) = with_spies(index, SpyStore::default());
	let status = service.connection_status().await;

	assert!(!status.connected);
	assert!(status.error.is_some());
	assert_eq!(status.collection, "acessos_condominio");
}
