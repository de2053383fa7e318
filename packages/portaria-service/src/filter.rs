use portaria_domain::{
	access::{SearchQuery, present},
	normalize,
	predicate::FilterPredicate,
};

/// Fields searched for a visitor name. The related-names index stores name variants the
/// direct field may not contain.
pub const PERSON_NAME_FIELDS: [&str; 2] =
	["pessoa_nome", "original_record.busca_otimizada.nomes_relacionados"];
pub const ENTRY_DATE_FIELD: &str = "entrada_data";
pub const PLATE_FIELD: &str = "original_record.veiculo.placa";

/// Either name field matching `name`.
pub fn person_name(name: &str) -> FilterPredicate {
	let name = normalize::canonical_upper(name);

	FilterPredicate::Or(
		PERSON_NAME_FIELDS
			.iter()
			.map(|field| FilterPredicate::text(field, name.as_str()))
			.collect(),
	)
}

/// Compiles the structured fields of `query` into one conjunction, or `None` when no
/// structured field is set. Free text and pagination are ignored.
pub fn compile(query: &SearchQuery) -> Option<FilterPredicate> {
	let mut conditions = Vec::new();

	if let Some(name) = present(&query.pessoa_nome) {
		conditions.push(person_name(name));
	}
	if let Some(document) = present(&query.pessoa_documento) {
		conditions.push(FilterPredicate::keyword("pessoa_documento", document));
	}
	if let Some(resident) = present(&query.morador_nome) {
		let resident = normalize::canonical_upper(resident);

		conditions.push(FilterPredicate::text("morador_nome", resident));
	}
	if let Some(number) = present(&query.residencia_numero) {
		conditions.push(FilterPredicate::keyword("residencia_numero", number));
	}
	if let Some(street) = present(&query.residencia_rua) {
		conditions.push(FilterPredicate::keyword("residencia_rua", street));
	}
	if let Some(plate) = present(&query.veiculo_placa) {
		conditions.push(FilterPredicate::keyword(PLATE_FIELD, plate.to_uppercase()));
	}
	if let Some(start) = present(&query.data_inicio) {
		conditions.push(FilterPredicate::since(ENTRY_DATE_FIELD, format!("{start}T00:00:00")));
	}
	if let Some(end) = present(&query.data_fim) {
		conditions.push(FilterPredicate::until(ENTRY_DATE_FIELD, format!("{end}T23:59:59")));
	}
	if let Some(inside) = query.ainda_dentro {
		conditions.push(FilterPredicate::flag("ainda_dentro", inside));
	}
	if let Some(has_vehicle) = query.tem_veiculo {
		conditions.push(FilterPredicate::flag("tem_veiculo", has_vehicle));
	}
	if let Some(period) = query.periodo_dia {
		conditions.push(FilterPredicate::keyword("periodo_dia", period.as_str()));
	}
	if let Some(weekday) = query.dia_semana {
		conditions.push(FilterPredicate::keyword("dia_semana", weekday.as_str()));
	}

	if conditions.is_empty() { None } else { Some(FilterPredicate::And(conditions)) }
}

#[cfg(test)]
mod tests {
	use portaria_domain::{
		access::{DayPeriod, Weekday},
		predicate::ExactValue,
	};

	use super::*;

	#[test]
	fn empty_query_compiles_to_no_filter() {
		let query = SearchQuery {
			query: Some("ALGUEM".to_string()),
			pessoa_nome: Some("   ".to_string()),
			limit: 5,
			offset: 20,
			..SearchQuery::default()
		};

		assert_eq!(compile(&query), None);
	}

	#[test]
	fn person_name_expands_to_either_name_field() {
		let query = SearchQuery {
			pessoa_nome: Some("  José Souza ".to_string()),
			..SearchQuery::default()
		};
		let Some(FilterPredicate::And(conditions)) = compile(&query) else {
			panic!("Expected a conjunction.");
		};

		assert_eq!(
			conditions,
			vec![FilterPredicate::Or(vec![
				FilterPredicate::text("pessoa_nome", "JOSE SOUZA"),
				FilterPredicate::text(PERSON_NAME_FIELDS[1], "JOSE SOUZA"),
			])]
		);
	}

	#[test]
	fn date_bounds_cover_whole_days() {
		let query = SearchQuery {
			data_inicio: Some("2025-05-01".to_string()),
			data_fim: Some("2025-05-31".to_string()),
			..SearchQuery::default()
		};
		let Some(FilterPredicate::And(conditions)) = compile(&query) else {
			panic!("Expected a conjunction.");
		};

		assert_eq!(
			conditions,
			vec![
				FilterPredicate::since("entrada_data", "2025-05-01T00:00:00"),
				FilterPredicate::until("entrada_data", "2025-05-31T23:59:59"),
			]
		);
	}

	#[test]
	fn every_structured_field_emits_one_condition() {
		let query = SearchQuery {
			pessoa_nome: Some("ANA LIMA".to_string()),
			pessoa_documento: Some("123".to_string()),
			morador_nome: Some("carlos".to_string()),
			residencia_numero: Some("236".to_string()),
			residencia_rua: Some("RUA A".to_string()),
			veiculo_placa: Some("abc1d23".to_string()),
			data_inicio: Some("2025-05-01".to_string()),
			data_fim: Some("2025-05-02".to_string()),
			ainda_dentro: Some(false),
			tem_veiculo: Some(true),
			periodo_dia: Some(DayPeriod::Noite),
			dia_semana: Some(Weekday::Sabado),
			..SearchQuery::default()
		};
		let Some(FilterPredicate::And(conditions)) = compile(&query) else {
			panic!("Expected a conjunction.");
		};

		assert_eq!(conditions.len(), 12);
		assert!(conditions.contains(&FilterPredicate::Exact {
			field: PLATE_FIELD.to_string(),
			value: ExactValue::Keyword("ABC1D23".to_string()),
		}));
		assert!(conditions.contains(&FilterPredicate::keyword("dia_semana", "sabado")));
		assert!(conditions.contains(&FilterPredicate::flag("ainda_dentro", false)));
	}
}
