use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
	pub service: Service,
	#[serde(default)]
	pub security: Security,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub tracking: Tracking,
	#[serde(default)]
	pub heatmap: Heatmap,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Service {
	pub mcp_bind: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Security {
	/// Either "off" or "static_key".
	#[serde(default = "default_auth_mode")]
	pub auth_mode: String,
	pub bearer_token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Storage {
	pub qdrant: Qdrant,
	pub firestore: Firestore,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Qdrant {
	pub url: String,
	pub api_key: Option<String>,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Firestore {
	#[serde(default = "default_firestore_api_base")]
	pub api_base: String,
	pub project_id: String,
	#[serde(default = "default_firestore_database")]
	pub database: String,
	/// Web API key, sent as the `key` query parameter.
	pub api_key: Option<String>,
	/// OAuth2 access token, sent as a bearer token.
	pub access_token: Option<String>,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default = "default_page_size")]
	pub page_size: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	/// Inputs longer than this many characters are truncated before embedding.
	#[serde(default = "default_max_input_chars")]
	pub max_input_chars: usize,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Search {
	#[serde(default = "default_limit")]
	pub default_limit: u32,
	#[serde(default = "default_max_limit")]
	pub max_limit: u32,
	#[serde(default = "default_score_threshold")]
	pub default_score_threshold: f32,
	/// Relaxed threshold for the filtered person-name path.
	#[serde(default = "default_person_name_score_threshold")]
	pub person_name_score_threshold: f32,
	#[serde(default)]
	pub classifier: Classifier,
	#[serde(default)]
	pub normalizer: Normalizer,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Classifier {
	/// Queries containing any of these are about a destination, never a visitor.
	#[serde(default = "default_resident_keywords")]
	pub resident_keywords: Vec<String>,
	/// Connective particles that do not count as name tokens.
	#[serde(default = "default_name_particles")]
	pub name_particles: Vec<String>,
	#[serde(default = "default_min_name_tokens")]
	pub min_name_tokens: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Normalizer {
	#[serde(default = "default_short_query_chars")]
	pub short_query_chars: usize,
	#[serde(default = "default_context_terms")]
	pub context_terms: Vec<String>,
	#[serde(default = "default_visitor_keywords")]
	pub visitor_keywords: Vec<String>,
	/// Each term is emitted followed by the query when no visitor keyword is present.
	#[serde(default = "default_person_terms")]
	pub person_terms: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Tracking {
	#[serde(default = "default_users_collection")]
	pub users_collection: String,
	#[serde(default = "default_tokens_collection")]
	pub tokens_collection: String,
	#[serde(default = "default_steps_collection")]
	pub steps_collection: String,
	#[serde(default = "default_max_visitors")]
	pub max_visitors: usize,
	/// Reject unrecognized token reference shapes instead of serializing them.
	#[serde(default)]
	pub strict_token_refs: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Heatmap {
	#[serde(default = "default_window_days")]
	pub default_window_days: u32,
	#[serde(default = "default_max_records")]
	pub default_max_records: usize,
	#[serde(default = "default_cell_size_degrees")]
	pub cell_size_degrees: f64,
	/// A cell becomes a hotspot when its point count is strictly greater than this.
	#[serde(default = "default_hotspot_min_points")]
	pub hotspot_min_points: usize,
	#[serde(default = "default_max_hotspots")]
	pub max_hotspots: usize,
}

impl Default for Security {
	fn default() -> Self {
		Self { auth_mode: default_auth_mode(), bearer_token: None }
	}
}

impl Default for Search {
	fn default() -> Self {
		Self {
			default_limit: default_limit(),
			max_limit: default_max_limit(),
			default_score_threshold: default_score_threshold(),
			person_name_score_threshold: default_person_name_score_threshold(),
			classifier: Classifier::default(),
			normalizer: Normalizer::default(),
		}
	}
}

impl Default for Classifier {
	fn default() -> Self {
		Self {
			resident_keywords: default_resident_keywords(),
			name_particles: default_name_particles(),
			min_name_tokens: default_min_name_tokens(),
		}
	}
}

impl Default for Normalizer {
	fn default() -> Self {
		Self {
			short_query_chars: default_short_query_chars(),
			context_terms: default_context_terms(),
			visitor_keywords: default_visitor_keywords(),
			person_terms: default_person_terms(),
		}
	}
}

impl Default for Tracking {
	fn default() -> Self {
		Self {
			users_collection: default_users_collection(),
			tokens_collection: default_tokens_collection(),
			steps_collection: default_steps_collection(),
			max_visitors: default_max_visitors(),
			strict_token_refs: false,
		}
	}
}

impl Default for Heatmap {
	fn default() -> Self {
		Self {
			default_window_days: default_window_days(),
			default_max_records: default_max_records(),
			cell_size_degrees: default_cell_size_degrees(),
			hotspot_min_points: default_hotspot_min_points(),
			max_hotspots: default_max_hotspots(),
		}
	}
}

fn strings(values: &[&str]) -> Vec<String> {
	values.iter().map(|value| value.to_string()).collect()
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_auth_mode() -> String {
	"off".to_string()
}

fn default_firestore_api_base() -> String {
	"https://firestore.googleapis.com".to_string()
}

fn default_firestore_database() -> String {
	"(default)".to_string()
}

fn default_timeout_ms() -> u64 {
	10_000
}

fn default_page_size() -> u32 {
	300
}

fn default_max_input_chars() -> usize {
	8_000
}

fn default_limit() -> u32 {
	10
}

fn default_max_limit() -> u32 {
	100
}

fn default_score_threshold() -> f32 {
	0.55
}

fn default_person_name_score_threshold() -> f32 {
	0.5
}

fn default_resident_keywords() -> Vec<String> {
	strings(&["MORADOR", "RESIDENTE", "PROPRIETARIO", "APARTAMENTO", "QUADRA"])
}

fn default_name_particles() -> Vec<String> {
	strings(&["DE", "DA", "DO", "DOS", "DAS", "E"])
}

fn default_min_name_tokens() -> usize {
	2
}

fn default_short_query_chars() -> usize {
	50
}

fn default_context_terms() -> Vec<String> {
	strings(&[
		"VISITANTE",
		"PESSOA",
		"DOCUMENTO",
		"NOME COMPLETO",
		"Registro de acesso condomínio",
		"Entrada saída veículo",
		"Controle acesso portaria",
	])
}

fn default_visitor_keywords() -> Vec<String> {
	strings(&[
		"VISITA",
		"VISITANTE",
		"PESSOA",
		"PEDREIRO",
		"FAXINEIRO",
		"ENTREGADOR",
		"MOTORISTA",
		"PRESTADOR",
		"PRESTADOR DE SERVIÇO",
	])
}

fn default_person_terms() -> Vec<String> {
	strings(&["PESSOA NOME", "VISITANTE"])
}

fn default_users_collection() -> String {
	"users".to_string()
}

fn default_tokens_collection() -> String {
	"tokens".to_string()
}

fn default_steps_collection() -> String {
	"tokenSteps".to_string()
}

fn default_max_visitors() -> usize {
	1
}

fn default_window_days() -> u32 {
	7
}

fn default_max_records() -> usize {
	10_000
}

fn default_cell_size_degrees() -> f64 {
	0.0001
}

fn default_hotspot_min_points() -> usize {
	3
}

fn default_max_hotspots() -> usize {
	10
}
