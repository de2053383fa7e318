use serde::Serialize;

/// Backend-agnostic filter tree over payload fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterPredicate {
	And(Vec<FilterPredicate>),
	Or(Vec<FilterPredicate>),
	Exact { field: String, value: ExactValue },
	/// Full-text match against a text-indexed field.
	Text { field: String, text: String },
	/// Inclusive bounds compared as ISO-8601 date-times.
	Range { field: String, gte: Option<String>, lte: Option<String> },
}
impl FilterPredicate {
	pub fn keyword(field: &str, value: impl Into<String>) -> Self {
		Self::Exact { field: field.to_string(), value: ExactValue::Keyword(value.into()) }
	}

	pub fn flag(field: &str, value: bool) -> Self {
		Self::Exact { field: field.to_string(), value: ExactValue::Bool(value) }
	}

	pub fn text(field: &str, text: impl Into<String>) -> Self {
		Self::Text { field: field.to_string(), text: text.into() }
	}

	pub fn since(field: &str, gte: impl Into<String>) -> Self {
		Self::Range { field: field.to_string(), gte: Some(gte.into()), lte: None }
	}

	pub fn until(field: &str, lte: impl Into<String>) -> Self {
		Self::Range { field: field.to_string(), gte: None, lte: Some(lte.into()) }
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExactValue {
	Keyword(String),
	Bool(bool),
}

#[cfg(test)]
mod tests {
	use super::*;

	fn collect_fields<'a>(predicate: &'a FilterPredicate, out: &mut Vec<&'a str>) {
		match predicate {
			FilterPredicate::And(children) | FilterPredicate::Or(children) =>
				for child in children {
					collect_fields(child, out);
				},
			FilterPredicate::Exact { field, .. }
			| FilterPredicate::Text { field, .. }
			| FilterPredicate::Range { field, .. } => out.push(field.as_str()),
		}
	}

	#[test]
	fn fields_walk_nested_groups() {
		let predicate = FilterPredicate::And(vec![
			FilterPredicate::Or(vec![
				FilterPredicate::text("pessoa_nome", "ANA"),
				FilterPredicate::text("original_record.busca_otimizada.nomes_relacionados", "ANA"),
			]),
			FilterPredicate::flag("ainda_dentro", true),
		]);

		let mut fields = Vec::new();

		collect_fields(&predicate, &mut fields);

		assert_eq!(
			fields,
			vec![
				"pessoa_nome",
				"original_record.busca_otimizada.nomes_relacionados",
				"ainda_dentro",
			]
		);
	}
}
