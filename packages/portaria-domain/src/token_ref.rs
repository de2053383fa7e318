//! Canonicalization of tracking-token references.
//!
//! Upstream writers persist a token reference as a document reference object, as a
//! full or relative path string, or as a bare id. Every shape is collapsed into
//! [`TokenRef`] where it is first read.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenRef {
	/// A document reference exposing its path, e.g. `{"referencePath": "tokens/ABC"}`.
	Structured { path: String },
	/// A path or bare id.
	Text(String),
	/// Any other shape.
	Unrecognized(Value),
}
impl TokenRef {
	pub fn from_value(value: Value) -> Self {
		match value {
			Value::String(text) => Self::Text(text),
			Value::Number(number) => Self::Text(number.to_string()),
			Value::Object(object) => match path_field(&object).map(str::to_string) {
				Some(path) => Self::Structured { path },
				None => Self::Unrecognized(Value::Object(object)),
			},
			other => Self::Unrecognized(other),
		}
	}

	/// Extracts the document id inside `collection`.
	pub fn canonical_id(&self, collection: &str) -> Result<String, AmbiguousReference> {
		let id = match self {
			Self::Structured { path } => last_segment(path),
			Self::Text(text) => strip_collection(text, collection),
			Self::Unrecognized(value) => return Err(AmbiguousReference { raw: value.to_string() }),
		};

		if id.is_empty() {
			return Err(AmbiguousReference { raw: self.raw() });
		}

		Ok(id.to_string())
	}

	/// Like [`Self::canonical_id`], but falls back to the serialized reference. The
	/// returned flag is `true` when the fallback was taken.
	pub fn canonical_id_lossy(&self, collection: &str) -> (String, bool) {
		match self.canonical_id(collection) {
			Ok(id) => (id, false),
			Err(err) => (err.raw, true),
		}
	}

	fn raw(&self) -> String {
		match self {
			Self::Structured { path } => path.clone(),
			Self::Text(text) => text.clone(),
			Self::Unrecognized(value) => value.to_string(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousReference {
	/// Serialized form of the reference that could not be canonicalized.
	pub raw: String,
}

/// Whether a persisted reference field points at `id`, by substring containment.
pub fn stored_ref_contains(stored: &Value, id: &str) -> bool {
	if id.is_empty() {
		return false;
	}

	match stored {
		Value::String(text) => text.contains(id),
		Value::Object(object) => path_field(object).is_some_and(|path| path.contains(id)),
		_ => false,
	}
}

fn path_field(object: &serde_json::Map<String, Value>) -> Option<&str> {
	["referencePath", "path"].into_iter().find_map(|key| object.get(key).and_then(Value::as_str))
}

fn last_segment(path: &str) -> &str {
	path.trim().trim_end_matches('/').rsplit('/').next().unwrap_or_default()
}

fn strip_collection<'a>(text: &'a str, collection: &str) -> &'a str {
	let text = text.trim();
	let marker = format!("/{collection}/");

	if let Some(position) = text.rfind(&marker) {
		return last_segment(&text[position + marker.len()..]);
	}

	let text = text.trim_start_matches('/');

	text.strip_prefix(collection).and_then(|rest| rest.strip_prefix('/')).unwrap_or(text)
}
