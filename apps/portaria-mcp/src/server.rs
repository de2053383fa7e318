use std::{net::SocketAddr, sync::Arc};

use axum::{
	Router,
	body::Body,
	extract::State,
	http::{HeaderMap, Request, StatusCode},
	middleware::{self, Next},
	response::IntoResponse,
};
use color_eyre::Result;
use rmcp::{
	ErrorData, ServerHandler,
	handler::server::router::tool::ToolRouter,
	model::{CallToolResult, JsonObject, ServerCapabilities, ServerInfo},
	transport::streamable_http_server::{
		StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
	},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::net::TcpListener;

use crate::McpAuthState;
use portaria_domain::access::SearchQuery;
use portaria_service::{Error, HeatmapRequest, PortariaService, TextSearchRequest};

const HEADER_AUTHORIZATION: &str = "Authorization";

pub const TOOL_NAMES: [&str; 11] = [
	"access_search_text",
	"access_search_advanced",
	"access_search_filtered",
	"access_people_inside",
	"access_person_history",
	"access_resident_visits",
	"access_vehicle_records",
	"access_connection_status",
	"tracking_token_steps",
	"tracking_visitor",
	"tracking_heatmap",
];

#[derive(Debug, Deserialize)]
struct SearchTextArgs {
	query: String,
	#[serde(default)]
	limit: Option<u32>,
	#[serde(default)]
	offset: u32,
}

#[derive(Debug, Deserialize)]
struct SearchAdvancedArgs {
	query: String,
	score_threshold: f32,
	#[serde(default)]
	limit: Option<u32>,
	#[serde(default)]
	offset: u32,
}

#[derive(Debug, Deserialize)]
struct LimitArgs {
	#[serde(default)]
	limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PersonHistoryArgs {
	pessoa_documento: String,
	#[serde(default)]
	data_inicio: Option<String>,
	#[serde(default)]
	data_fim: Option<String>,
	#[serde(default)]
	limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ResidentVisitsArgs {
	morador_nome: String,
	#[serde(default)]
	data_inicio: Option<String>,
	#[serde(default)]
	data_fim: Option<String>,
	#[serde(default)]
	limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct VehicleRecordsArgs {
	veiculo_placa: String,
	#[serde(default)]
	limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TokenStepsArgs {
	/// A document id, a document path, or a stored reference object.
	token_ref: Value,
}

#[derive(Debug, Deserialize)]
struct VisitorArgs {
	name: String,
}

#[derive(Clone)]
struct PortariaMcp {
	service: Arc<PortariaService>,
	tool_router: ToolRouter<Self>,
}
impl PortariaMcp {
	fn new(service: Arc<PortariaService>) -> Self {
		Self { service, tool_router: Self::tool_router() }
	}
}

#[rmcp::tool_router]
impl PortariaMcp {
	#[rmcp::tool(
		name = "access_search_text",
		description = "Free-text search; visitor names are tried against the name fields first.",
		input_schema = search_text_schema()
	)]
	async fn access_search_text(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let args: SearchTextArgs = parse_args(params)?;
		let req = TextSearchRequest {
			query: args.query,
			limit: args.limit,
			offset: args.offset,
			score_threshold: None,
		};

		respond(self.service.search_text(req).await)
	}

	#[rmcp::tool(
		name = "access_search_advanced",
		description = "Free-text search with an explicit similarity threshold between 0 and 1.",
		input_schema = search_advanced_schema()
	)]
	async fn access_search_advanced(
		&self,
		params: JsonObject,
	) -> Result<CallToolResult, ErrorData> {
		let args: SearchAdvancedArgs = parse_args(params)?;
		let req = TextSearchRequest {
			query: args.query,
			limit: args.limit,
			offset: args.offset,
			score_threshold: Some(args.score_threshold),
		};

		respond(self.service.search_text(req).await)
	}

	#[rmcp::tool(
		name = "access_search_filtered",
		description = "Search access records by structured fields, optionally ranked by free text.",
		input_schema = search_filtered_schema()
	)]
	async fn access_search_filtered(
		&self,
		params: JsonObject,
	) -> Result<CallToolResult, ErrorData> {
		let query: SearchQuery = parse_args(params)?;

		respond(self.service.search_filtered(query).await)
	}

	#[rmcp::tool(
		name = "access_people_inside",
		description = "List visitors whose latest access has no exit yet.",
		input_schema = limit_schema()
	)]
	async fn access_people_inside(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let args: LimitArgs = parse_args(params)?;

		respond(self.service.people_inside(args.limit).await)
	}

	#[rmcp::tool(
		name = "access_person_history",
		description = "Access history of one visitor by document number.",
		input_schema = person_history_schema()
	)]
	async fn access_person_history(
		&self,
		params: JsonObject,
	) -> Result<CallToolResult, ErrorData> {
		let args: PersonHistoryArgs = parse_args(params)?;
		let page = self
			.service
			.person_history(&args.pessoa_documento, args.data_inicio, args.data_fim, args.limit)
			.await;

		respond(page)
	}

	#[rmcp::tool(
		name = "access_resident_visits",
		description = "Visits received by one resident, optionally within a date range.",
		input_schema = resident_visits_schema()
	)]
	async fn access_resident_visits(
		&self,
		params: JsonObject,
	) -> Result<CallToolResult, ErrorData> {
		let args: ResidentVisitsArgs = parse_args(params)?;
		let page = self
			.service
			.resident_visits(&args.morador_nome, args.data_inicio, args.data_fim, args.limit)
			.await;

		respond(page)
	}

	#[rmcp::tool(
		name = "access_vehicle_records",
		description = "Access records of one vehicle by plate.",
		input_schema = vehicle_records_schema()
	)]
	async fn access_vehicle_records(
		&self,
		params: JsonObject,
	) -> Result<CallToolResult, ErrorData> {
		let args: VehicleRecordsArgs = parse_args(params)?;

		respond(self.service.vehicle_records(&args.veiculo_placa, args.limit).await)
	}

	#[rmcp::tool(
		name = "access_connection_status",
		description = "Report vector backend reachability and the access collection's shape.",
		input_schema = empty_schema()
	)]
	async fn access_connection_status(
		&self,
		_params: JsonObject,
	) -> Result<CallToolResult, ErrorData> {
		respond(Ok(self.service.connection_status().await))
	}

	#[rmcp::tool(
		name = "tracking_token_steps",
		description = "Location steps emitted by one tracking token, oldest first.",
		input_schema = token_steps_schema()
	)]
	async fn tracking_token_steps(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let args: TokenStepsArgs = parse_args(params)?;

		respond(self.service.resolve_steps(args.token_ref).await)
	}

	#[rmcp::tool(
		name = "tracking_visitor",
		description = "Steps of every token assigned to visitors matching a name prefix.",
		input_schema = visitor_schema()
	)]
	async fn tracking_visitor(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let args: VisitorArgs = parse_args(params)?;

		respond(self.service.visitor_tracking(&args.name).await)
	}

	#[rmcp::tool(
		name = "tracking_heatmap",
		description = "Aggregate recent location steps into grid cells and hotspots.",
		input_schema = heatmap_schema()
	)]
	async fn tracking_heatmap(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let req: HeatmapRequest = parse_args(params)?;

		respond(self.service.heatmap(req).await)
	}
}

#[rmcp::tool_handler]
impl ServerHandler for PortariaMcp {
	fn get_info(&self) -> ServerInfo {
		ServerInfo {
			instructions: Some(
				"Portaria MCP server for condominium access records and visitor tracking."
					.to_string(),
			),
			capabilities: ServerCapabilities::builder().enable_tools().build(),
			..Default::default()
		}
	}
}

pub async fn serve_mcp(
	bind_addr: &str,
	auth_state: McpAuthState,
	service: Arc<PortariaService>,
) -> Result<()> {
	let bind_addr: SocketAddr = bind_addr.parse()?;
	let session_manager: Arc<LocalSessionManager> = Default::default();
	let mcp = StreamableHttpService::new(
		move || Ok(PortariaMcp::new(service.clone())),
		session_manager,
		StreamableHttpServerConfig::default(),
	);
	let router = Router::new()
		.fallback_service(mcp)
		.layer(middleware::from_fn_with_state(auth_state, mcp_auth_middleware));
	let listener = TcpListener::bind(bind_addr).await?;

	tracing::info!(%bind_addr, "MCP server listening.");

	axum::serve(listener, router).await?;

	Ok(())
}

fn parse_args<T>(params: JsonObject) -> Result<T, ErrorData>
where
	T: DeserializeOwned,
{
	serde_json::from_value(Value::Object(params))
		.map_err(|err| ErrorData::invalid_params(format!("Invalid arguments: {err}."), None))
}

/// Service failures become structured tool errors tagged with their kind.
fn respond<T>(result: portaria_service::Result<T>) -> Result<CallToolResult, ErrorData>
where
	T: Serialize,
{
	match result {
		Ok(value) => {
			let value = serde_json::to_value(value).map_err(|err| {
				ErrorData::internal_error(format!("Failed to encode tool result: {err}"), None)
			})?;

			Ok(CallToolResult::structured(value))
		},
		Err(err) => {
			tracing::warn!(error = %err, "Tool call failed.");

			Ok(CallToolResult::structured_error(serde_json::json!({
				"error": error_kind(&err),
				"message": err.to_string(),
			})))
		},
	}
}

fn error_kind(err: &Error) -> &'static str {
	match err.root() {
		Error::InvalidRequest { .. } => "invalid_request",
		Error::Validation { .. } => "validation_failed",
		Error::BackendUnavailable { .. } => "backend_unavailable",
		Error::Provider { .. } => "provider_failed",
		Error::AmbiguousReference { .. } => "ambiguous_reference",
		Error::Retrieval { .. } | Error::Resolution { .. } => "retrieval_failed",
	}
}

fn is_authorized(headers: &HeaderMap, auth_state: &McpAuthState) -> bool {
	match auth_state {
		McpAuthState::Off => true,
		McpAuthState::StaticKey { bearer_token } =>
			read_bearer_token(headers).is_some_and(|token| token == bearer_token),
	}
}

fn read_bearer_token(headers: &HeaderMap) -> Option<&str> {
	let raw = headers.get(HEADER_AUTHORIZATION)?;
	let value = raw.to_str().ok()?.trim();
	let token = value.strip_prefix("Bearer ")?.trim();

	if token.is_empty() { None } else { Some(token) }
}

async fn mcp_auth_middleware(
	State(auth_state): State<McpAuthState>,
	req: Request<Body>,
	next: Next,
) -> axum::response::Response {
	if !is_authorized(req.headers(), &auth_state) {
		return (
			StatusCode::UNAUTHORIZED,
			"Authentication required for security.auth_mode=static_key with a Bearer token.",
		)
			.into_response();
	}

	next.run(req).await
}

fn date_range_properties() -> JsonObject {
	rmcp::object!({
		"data_inicio": { "type": ["string", "null"], "description": "YYYY-MM-DD, inclusive." },
		"data_fim": { "type": ["string", "null"], "description": "YYYY-MM-DD, inclusive." },
		"limit": { "type": ["integer", "null"], "minimum": 1, "maximum": 100 }
	})
}

fn search_text_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["query"],
		"properties": {
			"query": { "type": "string" },
			"limit": { "type": ["integer", "null"], "minimum": 1, "maximum": 100 },
			"offset": { "type": ["integer", "null"], "minimum": 0 }
		}
	}))
}

fn search_advanced_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["query", "score_threshold"],
		"properties": {
			"query": { "type": "string" },
			"score_threshold": { "type": "number", "minimum": 0, "maximum": 1 },
			"limit": { "type": ["integer", "null"], "minimum": 1, "maximum": 100 },
			"offset": { "type": ["integer", "null"], "minimum": 0 }
		}
	}))
}

fn search_filtered_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"properties": {
			"query": { "type": ["string", "null"] },
			"pessoa_nome": { "type": ["string", "null"] },
			"pessoa_documento": { "type": ["string", "null"] },
			"morador_nome": { "type": ["string", "null"] },
			"residencia_numero": { "type": ["string", "null"] },
			"residencia_rua": { "type": ["string", "null"] },
			"veiculo_placa": { "type": ["string", "null"] },
			"data_inicio": { "type": ["string", "null"], "description": "YYYY-MM-DD, inclusive." },
			"data_fim": { "type": ["string", "null"], "description": "YYYY-MM-DD, inclusive." },
			"ainda_dentro": { "type": ["boolean", "null"] },
			"tem_veiculo": { "type": ["boolean", "null"] },
			"periodo_dia": {
				"type": ["string", "null"],
				"enum": ["manha", "tarde", "noite", null]
			},
			"dia_semana": {
				"type": ["string", "null"],
				"enum": ["segunda", "terca", "quarta", "quinta", "sexta", "sabado", "domingo", null]
			},
			"limit": { "type": ["integer", "null"], "minimum": 1, "maximum": 100 },
			"offset": { "type": ["integer", "null"], "minimum": 0 }
		}
	}))
}

fn limit_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"properties": {
			"limit": { "type": ["integer", "null"], "minimum": 1, "maximum": 100 }
		}
	}))
}

fn person_history_schema() -> Arc<JsonObject> {
	let mut properties = date_range_properties();

	properties.insert("pessoa_documento".to_string(), serde_json::json!({ "type": "string" }));

	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["pessoa_documento"],
		"properties": properties
	}))
}

fn resident_visits_schema() -> Arc<JsonObject> {
	let mut properties = date_range_properties();

	properties.insert("morador_nome".to_string(), serde_json::json!({ "type": "string" }));

	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["morador_nome"],
		"properties": properties
	}))
}

fn vehicle_records_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["veiculo_placa"],
		"properties": {
			"veiculo_placa": { "type": "string" },
			"limit": { "type": ["integer", "null"], "minimum": 1, "maximum": 100 }
		}
	}))
}

fn empty_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"properties": {}
	}))
}

fn token_steps_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["token_ref"],
		"properties": {
			"token_ref": {
				"description": "Token document id, document path, or stored reference object.",
				"type": ["string", "object"]
			}
		}
	}))
}

fn visitor_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["name"],
		"properties": {
			"name": { "type": "string", "description": "Display name prefix." }
		}
	}))
}

fn heatmap_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"properties": {
			"window_days": { "type": ["integer", "null"], "minimum": 1 },
			"max_records": { "type": ["integer", "null"], "minimum": 1 },
			"token_ids": { "type": "array", "items": { "type": "string" } },
			"user_ids": { "type": "array", "items": { "type": "string" } },
			"min_speed": { "type": ["number", "null"] },
			"max_speed": { "type": ["number", "null"] },
			"region": {
				"type": ["object", "null"],
				"required": ["lat_min", "lat_max", "lng_min", "lng_max"],
				"properties": {
					"lat_min": { "type": "number" },
					"lat_max": { "type": "number" },
					"lng_min": { "type": "number" },
					"lng_max": { "type": "number" }
				}
			}
		}
	}))
}
