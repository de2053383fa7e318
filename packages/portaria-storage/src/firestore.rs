//! Read-only Firestore client over the REST API.
//!
//! Documents are returned with their typed field values decoded into plain JSON so that
//! callers validate them with the same serde types they use elsewhere.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{Map, Value, json};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{Error, Result};

/// Shape written for decoded document references.
pub const REFERENCE_TYPE: &str = "firestore/documentReference/1.0";

#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
	pub id: String,
	/// Path relative to the database root, e.g. `tokens/ABC123`.
	pub path: String,
	pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
	Equal,
	ArrayContains,
	GreaterThanOrEqual,
	LessThanOrEqual,
}
impl FieldOp {
	fn as_str(self) -> &'static str {
		match self {
			Self::Equal => "EQUAL",
			Self::ArrayContains => "ARRAY_CONTAINS",
			Self::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
			Self::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
	String(String),
	Bool(bool),
	Timestamp(OffsetDateTime),
	/// Document path relative to the database root, e.g. `users/U1`.
	Reference(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
	pub field: String,
	pub op: FieldOp,
	pub value: FieldValue,
}
impl FieldFilter {
	pub fn new(field: &str, op: FieldOp, value: FieldValue) -> Self {
		Self { field: field.to_string(), op, value }
	}
}

pub struct FirestoreStore {
	client: Client,
	documents_root: String,
	database_path: String,
	api_key: Option<String>,
	access_token: Option<String>,
	page_size: u32,
}
impl FirestoreStore {
	pub fn new(cfg: &portaria_config::Firestore) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
		let database_path = format!("projects/{}/databases/{}", cfg.project_id, cfg.database);

		Ok(Self {
			client,
			documents_root: format!("{}/v1/{database_path}/documents", cfg.api_base),
			database_path,
			api_key: cfg.api_key.clone(),
			access_token: cfg.access_token.clone(),
			page_size: cfg.page_size,
		})
	}

	/// Point lookup; a missing document is `Ok(None)`.
	pub async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredDocument>> {
		let url = format!("{}/{collection}/{id}", self.documents_root);
		let res = self.authorize(self.client.get(url)).send().await?;

		if res.status() == StatusCode::NOT_FOUND {
			return Ok(None);
		}

		let body = read_json(res).await?;

		self.decode_document(&body).map(Some)
	}

	/// Every document in `collection`, following page tokens.
	pub async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>> {
		let url = format!("{}/{collection}", self.documents_root);
		let mut documents = Vec::new();
		let mut page_token: Option<String> = None;

		loop {
			let mut request =
				self.client.get(&url).query(&[("pageSize", self.page_size.to_string())]);

			if let Some(token) = page_token.take() {
				request = request.query(&[("pageToken", token)]);
			}

			let body = read_json(self.authorize(request).send().await?).await?;

			if let Some(items) = body.get("documents").and_then(Value::as_array) {
				for item in items {
					documents.push(self.decode_document(item)?);
				}
			}

			match body.get("nextPageToken").and_then(Value::as_str) {
				Some(token) if !token.is_empty() => page_token = Some(token.to_string()),
				_ => break,
			}
		}

		tracing::debug!(collection, count = documents.len(), "Listed collection.");

		Ok(documents)
	}

	/// Structured query over one collection; all filters must hold.
	pub async fn query(
		&self,
		collection: &str,
		filters: &[FieldFilter],
		limit: Option<u32>,
	) -> Result<Vec<StoredDocument>> {
		let body = self.structured_query(collection, filters, limit);
		let url = format!("{}:runQuery", self.documents_root);
		let res = self.authorize(self.client.post(url)).json(&body).send().await?;
		let rows = read_json(res).await?;
		let rows = rows
			.as_array()
			.ok_or_else(|| Error::Decode("runQuery response is not an array.".to_string()))?;
		let mut documents = Vec::with_capacity(rows.len());

		for row in rows {
			if let Some(document) = row.get("document") {
				documents.push(self.decode_document(document)?);
			}
		}

		Ok(documents)
	}

	pub(crate) fn structured_query(
		&self,
		collection: &str,
		filters: &[FieldFilter],
		limit: Option<u32>,
	) -> Value {
		let mut structured = Map::new();

		structured.insert("from".to_string(), json!([{ "collectionId": collection }]));

		let mut field_filters = filters
			.iter()
			.map(|filter| {
				json!({
					"fieldFilter": {
						"field": { "fieldPath": filter.field },
						"op": filter.op.as_str(),
						"value": self.encode_value(&filter.value),
					}
				})
			})
			.collect::<Vec<_>>();

		match field_filters.len() {
			0 => {},
			1 => {
				structured.insert("where".to_string(), field_filters.remove(0));
			},
			_ => {
				structured.insert(
					"where".to_string(),
					json!({ "compositeFilter": { "op": "AND", "filters": field_filters } }),
				);
			},
		}

		if let Some(limit) = limit {
			structured.insert("limit".to_string(), json!(limit));
		}

		json!({ "structuredQuery": structured })
	}

	fn encode_value(&self, value: &FieldValue) -> Value {
		match value {
			FieldValue::String(text) => json!({ "stringValue": text }),
			FieldValue::Bool(flag) => json!({ "booleanValue": flag }),
			FieldValue::Timestamp(ts) =>
				json!({ "timestampValue": ts.format(&Rfc3339).unwrap_or_default() }),
			FieldValue::Reference(path) => json!({
				"referenceValue": format!(
					"{}/documents/{}",
					self.database_path,
					path.trim_start_matches('/')
				)
			}),
		}
	}

	fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
		let request = match self.api_key.as_deref() {
			Some(key) => request.query(&[("key", key)]),
			None => request,
		};

		match self.access_token.as_deref() {
			Some(token) => request.bearer_auth(token),
			None => request,
		}
	}

	fn decode_document(&self, document: &Value) -> Result<StoredDocument> {
		let name = document
			.get("name")
			.and_then(Value::as_str)
			.ok_or_else(|| Error::Decode("Document is missing its name.".to_string()))?;
		let path = relative_path(name);
		let id = path.rsplit('/').next().unwrap_or_default().to_string();
		let data = match document.get("fields").and_then(Value::as_object) {
			Some(fields) => decode_fields(fields),
			None => Value::Object(Map::new()),
		};

		Ok(StoredDocument { id, path: path.to_string(), data })
	}
}

/// Converts a `fields` map of typed values into plain JSON.
pub fn decode_fields(fields: &Map<String, Value>) -> Value {
	Value::Object(fields.iter().map(|(key, value)| (key.clone(), decode_value(value))).collect())
}

pub fn decode_value(value: &Value) -> Value {
	let Some((kind, inner)) = value.as_object().and_then(|object| object.iter().next()) else {
		return Value::Null;
	};

	match kind.as_str() {
		"nullValue" => Value::Null,
		"booleanValue" | "doubleValue" | "stringValue" | "timestampValue" | "bytesValue" =>
			inner.clone(),
		"integerValue" => match inner {
			Value::String(raw) => raw.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
			other => other.clone(),
		},
		"referenceValue" => json!({
			"type": REFERENCE_TYPE,
			"referencePath": inner.as_str().map(relative_path).unwrap_or_default(),
		}),
		"geoPointValue" => json!({
			"latitude": inner.get("latitude").cloned().unwrap_or(json!(0.0)),
			"longitude": inner.get("longitude").cloned().unwrap_or(json!(0.0)),
		}),
		"arrayValue" => Value::Array(
			inner
				.get("values")
				.and_then(Value::as_array)
				.map(|values| values.iter().map(decode_value).collect())
				.unwrap_or_default(),
		),
		"mapValue" => match inner.get("fields").and_then(Value::as_object) {
			Some(fields) => decode_fields(fields),
			None => Value::Object(Map::new()),
		},
		_ => Value::Null,
	}
}

/// Strips the `projects/{p}/databases/{d}/documents/` prefix from a document name.
fn relative_path(name: &str) -> &str {
	match name.find("/documents/") {
		Some(index) => &name[index + "/documents/".len()..],
		None => name,
	}
}

async fn read_json(res: reqwest::Response) -> Result<Value> {
	let status = res.status();

	if !status.is_success() {
		let message = res.text().await.unwrap_or_default();

		return Err(Error::Firestore { status: status.as_u16(), message });
	}

	Ok(res.json().await?)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn store() -> FirestoreStore {
		FirestoreStore::new(&portaria_config::Firestore {
			api_base: "http://127.0.0.1:8081".to_string(),
			project_id: "demo".to_string(),
			database: "(default)".to_string(),
			api_key: None,
			access_token: None,
			timeout_ms: 1_000,
			page_size: 50,
		})
		.expect("Store must build.")
	}

	#[test]
	fn typed_values_decode_to_plain_json() {
		let fields = json!({
			"name": { "stringValue": "Tag 1" },
			"active": { "booleanValue": true },
			"count": { "integerValue": "42" },
			"tokenRef": {
				"referenceValue": "projects/demo/databases/(default)/documents/tokens/ABC123"
			},
			"last_position": {
				"mapValue": { "fields": { "latitude": { "doubleValue": -22.9 } } }
			},
			"spot": { "geoPointValue": { "latitude": 1.5, "longitude": 2.5 } },
			"users_assigned": {
				"arrayValue": {
					"values": [{
						"referenceValue": "projects/demo/databases/(default)/documents/users/U1"
					}]
				}
			},
			"empty": { "arrayValue": {} },
		});
		let decoded = decode_fields(fields.as_object().unwrap());

		assert_eq!(decoded["name"], "Tag 1");
		assert_eq!(decoded["active"], true);
		assert_eq!(decoded["count"], 42);
		assert_eq!(decoded["tokenRef"]["referencePath"], "tokens/ABC123");
		assert_eq!(decoded["tokenRef"]["type"], REFERENCE_TYPE);
		assert_eq!(decoded["last_position"]["latitude"], -22.9);
		assert_eq!(decoded["spot"]["longitude"], 2.5);
		assert_eq!(decoded["users_assigned"][0]["referencePath"], "users/U1");
		assert_eq!(decoded["empty"], json!([]));
	}

	#[test]
	fn single_filter_is_not_wrapped() {
		let filters = [FieldFilter::new(
			"tokenRef",
			FieldOp::Equal,
			FieldValue::Reference("tokens/ABC123".to_string()),
		)];
		let body = store().structured_query("tokenSteps", &filters, None);
		let filter = &body["structuredQuery"]["where"]["fieldFilter"];

		assert_eq!(filter["op"], "EQUAL");
		assert_eq!(
			filter["value"]["referenceValue"],
			"projects/demo/databases/(default)/documents/tokens/ABC123"
		);
		assert!(body["structuredQuery"].get("limit").is_none());
	}

	#[test]
	fn multiple_filters_are_and_composed() {
		let filters = [
			FieldFilter::new(
				"display_name",
				FieldOp::GreaterThanOrEqual,
				FieldValue::String("ANA".to_string()),
			),
			FieldFilter::new(
				"display_name",
				FieldOp::LessThanOrEqual,
				FieldValue::String("ANA\u{f8ff}".to_string()),
			),
		];
		let body = store().structured_query("users", &filters, Some(1));
		let composite = &body["structuredQuery"]["where"]["compositeFilter"];

		assert_eq!(composite["op"], "AND");
		assert_eq!(composite["filters"].as_array().map(Vec::len), Some(2));
		assert_eq!(body["structuredQuery"]["limit"], 1);
		assert_eq!(body["structuredQuery"]["from"][0]["collectionId"], "users");
	}
}
