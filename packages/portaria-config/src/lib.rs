mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Classifier, Config, EmbeddingProviderConfig, Firestore, Heatmap, Normalizer, Providers,
	Qdrant, Search, Security, Service, Storage, Tracking,
};

use std::{fs, net::SocketAddr, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.mcp_bind.trim().is_empty() {
		return Err(Error::invalid("service.mcp_bind", "must be non-empty."));
	}

	validate_security(cfg)?;

	if cfg.storage.qdrant.url.trim().is_empty() {
		return Err(Error::invalid("storage.qdrant.url", "must be non-empty."));
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::invalid("storage.qdrant.collection", "must be non-empty."));
	}
	if cfg.storage.firestore.project_id.trim().is_empty() {
		return Err(Error::invalid("storage.firestore.project_id", "must be non-empty."));
	}
	if cfg.storage.firestore.page_size == 0 {
		return Err(Error::invalid("storage.firestore.page_size", "must be greater than zero."));
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::invalid(
			"providers.embedding.dimensions",
			"must be greater than zero.",
		));
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::invalid(
			"providers.embedding.dimensions",
			"must match storage.qdrant.vector_dim.",
		));
	}
	if cfg.providers.embedding.max_input_chars == 0 {
		return Err(Error::invalid(
			"providers.embedding.max_input_chars",
			"must be greater than zero.",
		));
	}

	validate_search(cfg)?;
	validate_tracking(cfg)?;
	validate_heatmap(cfg)?;

	Ok(())
}

fn normalize(cfg: &mut Config) {
	blank_to_none(&mut cfg.security.bearer_token);
	blank_to_none(&mut cfg.storage.qdrant.api_key);
	blank_to_none(&mut cfg.storage.firestore.api_key);
	blank_to_none(&mut cfg.storage.firestore.access_token);

	cfg.security.auth_mode = cfg.security.auth_mode.trim().to_ascii_lowercase();

	let firestore_base = cfg.storage.firestore.api_base.trim_end_matches('/').to_string();

	cfg.storage.firestore.api_base = firestore_base;
}

fn blank_to_none(value: &mut Option<String>) {
	if value.as_deref().is_some_and(|raw| raw.trim().is_empty()) {
		*value = None;
	}
}

fn validate_security(cfg: &Config) -> Result<()> {
	match cfg.security.auth_mode.as_str() {
		"off" => {
			let bind: SocketAddr = cfg
				.service
				.mcp_bind
				.parse()
				.map_err(|_| Error::invalid("service.mcp_bind", "must be a socket address."))?;

			if !bind.ip().is_loopback() {
				return Err(Error::invalid(
					"security.auth_mode",
					"off is only allowed when service.mcp_bind is a loopback address.",
				));
			}
		},
		"static_key" =>
			if cfg.security.bearer_token.is_none() {
				return Err(Error::invalid(
					"security.bearer_token",
					"must be set when auth_mode is static_key.",
				));
			},
		_ => {
			return Err(Error::invalid("security.auth_mode", "must be one of off or static_key."));
		},
	}

	Ok(())
}

fn validate_search(cfg: &Config) -> Result<()> {
	let search = &cfg.search;

	for (key, value) in [
		("search.default_score_threshold", search.default_score_threshold),
		("search.person_name_score_threshold", search.person_name_score_threshold),
	] {
		if !value.is_finite() || !(0.0..=1.0).contains(&value) {
			return Err(Error::invalid(key, "must be a finite number in the range 0.0-1.0."));
		}
	}

	if search.person_name_score_threshold > search.default_score_threshold {
		return Err(Error::invalid(
			"search.person_name_score_threshold",
			"must not exceed search.default_score_threshold.",
		));
	}
	if search.default_limit == 0 {
		return Err(Error::invalid("search.default_limit", "must be greater than zero."));
	}
	if search.default_limit > search.max_limit {
		return Err(Error::invalid("search.default_limit", "must not exceed search.max_limit."));
	}
	if search.classifier.min_name_tokens == 0 {
		return Err(Error::invalid(
			"search.classifier.min_name_tokens",
			"must be greater than zero.",
		));
	}
	if search.normalizer.short_query_chars == 0 {
		return Err(Error::invalid(
			"search.normalizer.short_query_chars",
			"must be greater than zero.",
		));
	}

	Ok(())
}

fn validate_tracking(cfg: &Config) -> Result<()> {
	for (key, value) in [
		("tracking.users_collection", &cfg.tracking.users_collection),
		("tracking.tokens_collection", &cfg.tracking.tokens_collection),
		("tracking.steps_collection", &cfg.tracking.steps_collection),
	] {
		if value.trim().is_empty() || value.contains('/') {
			return Err(Error::invalid(key, "must be a non-empty collection id without '/'."));
		}
	}

	if cfg.tracking.max_visitors == 0 {
		return Err(Error::invalid("tracking.max_visitors", "must be greater than zero."));
	}

	Ok(())
}

fn validate_heatmap(cfg: &Config) -> Result<()> {
	let heatmap = &cfg.heatmap;

	if heatmap.default_window_days == 0 {
		return Err(Error::invalid("heatmap.default_window_days", "must be greater than zero."));
	}
	if heatmap.default_max_records == 0 {
		return Err(Error::invalid("heatmap.default_max_records", "must be greater than zero."));
	}
	if !heatmap.cell_size_degrees.is_finite() || heatmap.cell_size_degrees <= 0.0 {
		return Err(Error::invalid(
			"heatmap.cell_size_degrees",
			"must be a finite number greater than zero.",
		));
	}
	if heatmap.max_hotspots == 0 {
		return Err(Error::invalid("heatmap.max_hotspots", "must be greater than zero."));
	}

	Ok(())
}
