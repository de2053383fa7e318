use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

/// Embeds one query text with an OpenAI-compatible embeddings endpoint.
///
/// Input longer than `max_input_chars` characters is truncated first.
pub async fn embed_query(
	cfg: &portaria_config::EmbeddingProviderConfig,
	text: &str,
) -> Result<Vec<f32>> {
	let input = truncate_chars(text, cfg.max_input_chars);

	if input.len() < text.len() {
		tracing::debug!(
			original_chars = text.chars().count(),
			max_input_chars = cfg.max_input_chars,
			"Truncated embedding input."
		);
	}

	let mut vectors = embed(cfg, &[input]).await?;
	let vector = vectors.pop().ok_or_else(|| Error::response("Embedding response is empty."))?;

	if vector.len() != cfg.dimensions as usize {
		return Err(Error::response(format!(
			"Embedding has {} dimensions; expected {}.",
			vector.len(),
			cfg.dimensions
		)));
	}

	Ok(vector)
}

pub async fn embed(
	cfg: &portaria_config::EmbeddingProviderConfig,
	texts: &[&str],
) -> Result<Vec<Vec<f32>>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"input": texts,
		"dimensions": cfg.dimensions,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_embedding_response(json)
}

/// Longest prefix of `text` with at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
	match text.char_indices().nth(max_chars) {
		Some((byte_index, _)) => &text[..byte_index],
		None => text,
	}
}

fn parse_embedding_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json
		.get("data")
		.and_then(Value::as_array)
		.ok_or_else(|| Error::response("Embedding response is missing data array."))?;
	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(Value::as_u64)
			.map(|v| v as usize)
			.unwrap_or(fallback_index);
		let embedding = item
			.get("embedding")
			.and_then(Value::as_array)
			.ok_or_else(|| Error::response("Embedding item missing embedding array."))?;
		let vector = embedding
			.iter()
			.map(|value| {
				value
					.as_f64()
					.map(|number| number as f32)
					.ok_or_else(|| Error::response("Embedding value must be numeric."))
			})
			.collect::<Result<Vec<_>>>()?;

		indexed.push((index, vector));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_embeddings_in_index_order() {
		let json = serde_json::json!({
			"data": [
				{ "index": 1, "embedding": [2.0, 3.0] },
				{ "index": 0, "embedding": [0.5, 1.5] }
			]
		});
		let parsed = parse_embedding_response(json).expect("parse failed");

		assert_eq!(parsed, vec![vec![0.5, 1.5], vec![2.0, 3.0]]);
	}

	#[test]
	fn non_numeric_values_are_rejected() {
		let json = serde_json::json!({ "data": [{ "embedding": ["x"] }] });

		assert!(matches!(parse_embedding_response(json), Err(Error::InvalidResponse { .. })));
	}

	#[test]
	fn truncation_counts_characters_not_bytes() {
		assert_eq!(truncate_chars("ação", 2), "aç");
		assert_eq!(truncate_chars("abc", 8_000), "abc");
		assert_eq!(truncate_chars("", 3), "");
	}
}
