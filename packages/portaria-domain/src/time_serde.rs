pub mod option;

use serde::Serializer;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	let text = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;

	serializer.serialize_str(&text)
}
