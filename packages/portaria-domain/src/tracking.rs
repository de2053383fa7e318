//! Tracking entities read from the document store: visitors, their tokens, and the
//! location steps each token emits.

use std::cmp::Ordering;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::token_ref::TokenRef;

/// One location ping. Parsed leniently; absent or malformed fields become `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationStep {
	pub id: String,
	pub token_id: Option<String>,
	pub user_id: Option<String>,
	#[serde(serialize_with = "crate::time_serde::option::serialize")]
	pub timestamp: Option<OffsetDateTime>,
	pub latitude: Option<f64>,
	pub longitude: Option<f64>,
	pub accuracy: Option<f64>,
	pub address: Option<String>,
	pub speed_kmh: Option<f64>,
}
impl LocationStep {
	/// Reads a step document. `timestamp` wins over `last_updated`; the position comes
	/// from `last_position` and falls back to top-level coordinates.
	pub fn from_document(id: &str, data: &Value, tokens_collection: &str) -> Self {
		let position = data.get("last_position").and_then(Value::as_object);
		let coordinate = |key: &str| {
			position
				.and_then(|position| position.get(key))
				.or_else(|| data.get(key))
				.and_then(Value::as_f64)
		};
		let timestamp = data
			.get("timestamp")
			.and_then(parse_timestamp)
			.or_else(|| data.get("last_updated").and_then(parse_timestamp));
		let token_id = data
			.get("tokenRef")
			.filter(|value| !value.is_null())
			.map(|value| TokenRef::from_value(value.clone()))
			.and_then(|token| token.canonical_id(tokens_collection).ok());

		Self {
			id: id.to_string(),
			token_id,
			user_id: data.get("userId").or_else(|| data.get("user_id")).and_then(reference_id),
			timestamp,
			latitude: coordinate("latitude"),
			longitude: coordinate("longitude"),
			accuracy: data
				.get("accuracy")
				.or_else(|| position.and_then(|position| position.get("accuracy")))
				.and_then(Value::as_f64),
			address: data.get("address").and_then(Value::as_str).map(str::to_string),
			speed_kmh: data
				.get("last_speed_kmh")
				.or_else(|| data.get("speed"))
				.and_then(Value::as_f64),
		}
	}

	/// Latitude and longitude when both are finite, in range, and not the `(0, 0)`
	/// placeholder written by devices without a fix.
	pub fn position(&self) -> Option<(f64, f64)> {
		let (latitude, longitude) = (self.latitude?, self.longitude?);

		if !latitude.is_finite() || !longitude.is_finite() {
			return None;
		}
		if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
			return None;
		}
		if latitude == 0.0 && longitude == 0.0 {
			return None;
		}

		Some((latitude, longitude))
	}
}

/// Orders steps by ascending timestamp. Steps without a timestamp come first; ties keep
/// their id order.
pub fn sort_steps(steps: &mut [LocationStep]) {
	steps.sort_by(|a, b| match (a.timestamp, b.timestamp) {
		(Some(left), Some(right)) => left.cmp(&right).then_with(|| a.id.cmp(&b.id)),
		(None, Some(_)) => Ordering::Less,
		(Some(_), None) => Ordering::Greater,
		(None, None) => a.id.cmp(&b.id),
	});
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingToken {
	#[serde(default)]
	pub id: String,
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	pub active: bool,
	#[serde(
		default,
		deserialize_with = "timestamp_field",
		serialize_with = "crate::time_serde::option::serialize"
	)]
	pub created_at: Option<OffsetDateTime>,
	/// Document paths of the assigned users.
	#[serde(default, deserialize_with = "reference_list")]
	pub users_assigned: Vec<String>,
}
impl TrackingToken {
	pub fn from_document(id: &str, data: Value) -> serde_json::Result<Self> {
		let mut token: Self = serde_json::from_value(data)?;

		token.id = id.to_string();

		Ok(token)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visitor {
	#[serde(default)]
	pub uid: String,
	pub display_name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub phone_number: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub photo_url: Option<String>,
	#[serde(
		default,
		deserialize_with = "timestamp_field",
		serialize_with = "crate::time_serde::option::serialize",
		skip_serializing_if = "Option::is_none"
	)]
	pub created_at: Option<OffsetDateTime>,
}
impl Visitor {
	pub fn from_document(id: &str, data: Value) -> serde_json::Result<Self> {
		let mut visitor: Self = serde_json::from_value(data)?;

		visitor.uid = id.to_string();

		Ok(visitor)
	}
}

/// Accepts RFC 3339 strings and `{seconds, nanos}` objects, including the underscored
/// field names some exporters write.
pub fn parse_timestamp(value: &Value) -> Option<OffsetDateTime> {
	match value {
		Value::String(text) => OffsetDateTime::parse(text, &Rfc3339).ok(),
		Value::Object(object) => {
			let seconds = integer_field(object, &["seconds", "_seconds"])?;
			let nanos =
				integer_field(object, &["nanos", "nanoseconds", "_nanoseconds"]).unwrap_or(0);
			let base = OffsetDateTime::from_unix_timestamp(seconds).ok()?;

			base.checked_add(time::Duration::nanoseconds(nanos))
		},
		_ => None,
	}
}

fn integer_field(object: &Map<String, Value>, keys: &[&str]) -> Option<i64> {
	keys.iter().find_map(|key| {
		let value = object.get(*key)?;

		value.as_i64().or_else(|| value.as_str().and_then(|text| text.parse().ok()))
	})
}

fn reference_id(value: &Value) -> Option<String> {
	let path = match value {
		Value::String(text) => text.as_str(),
		Value::Object(object) => object.get("referencePath").and_then(Value::as_str)?,
		_ => return None,
	};
	let id = path.trim_end_matches('/').rsplit('/').next().unwrap_or_default();

	(!id.is_empty()).then(|| id.to_string())
}

fn timestamp_field<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = Option::<Value>::deserialize(deserializer)?;

	Ok(raw.as_ref().and_then(parse_timestamp))
}

fn reference_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();

	Ok(raw
		.into_iter()
		.filter_map(|value| match value {
			Value::String(text) => Some(text),
			Value::Object(mut object) => match object.remove("referencePath") {
				Some(Value::String(path)) => Some(path),
				_ => None,
			},
			_ => None,
		})
		.collect())
}
