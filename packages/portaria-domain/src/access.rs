//! Access-log records as indexed in the vector collection, and the query envelope used
//! to search them.
//!
//! Field names mirror the indexed payload keys so that a payload deserializes without
//! renames and filter fields can be named by the same strings.

use serde::{Deserialize, Serialize};
use time::{Date, macros::format_description};

pub const MAX_LIMIT: u32 = 100;
/// Deepest page a caller may request; deeper paging is a scan, not a search.
pub const MAX_OFFSET: u32 = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRecord {
	pub id: String,
	pub tipo_registro: String,
	pub fonte_dados: String,
	pub timestamp_indexacao: String,
	pub text_for_embedding: String,
	pub pessoa_nome: String,
	pub pessoa_documento: String,
	pub pessoa_cidade: String,
	pub pessoa_uf: String,
	pub morador_id: String,
	pub morador_nome: String,
	pub tem_destino: bool,
	pub residencia_numero: String,
	pub residencia_rua: String,
	pub residencia_endereco: String,
	pub tem_veiculo: bool,
	pub terminal_nome: String,
	pub terminal_codigo: String,
	pub entrada_data: String,
	pub entrada_hora: String,
	pub entrada_datetime: String,
	pub saida_data: String,
	pub saida_hora: String,
	pub saida_datetime: String,
	pub tempo_permanencia_minutos: f64,
	pub periodo_dia: String,
	pub dia_semana: String,
	pub status_acesso: String,
	pub ainda_dentro: bool,
	pub original_record: OriginalRecord,
}
impl AccessRecord {
	/// Validates an untyped payload. Unknown keys are ignored; missing or mistyped
	/// required keys fail.
	pub fn from_payload(payload: serde_json::Value) -> serde_json::Result<Self> {
		serde_json::from_value(payload)
	}

	/// Whether the recorded exit does not precede the recorded entry.
	///
	/// Records without an exit time, or with timestamps that do not compare, are
	/// considered consistent.
	pub fn exit_follows_entry(&self) -> bool {
		if self.saida_datetime.trim().is_empty() || self.entrada_datetime.trim().is_empty() {
			return true;
		}

		self.saida_datetime >= self.entrada_datetime
	}

	/// Whether `ainda_dentro` agrees with the presence of an exit time.
	pub fn inside_flag_consistent(&self) -> bool {
		self.ainda_dentro == self.saida_datetime.trim().is_empty()
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginalRecord {
	pub id: String,
	pub tipo_registro: String,
	pub timestamp_indexacao: String,
	pub conteudo_principal: String,
	pub terminal: Terminal,
	pub veiculo: Vehicle,
	pub acesso: Access,
	pub usuarios: Operators,
	pub pessoa: Person,
	pub metadados: Metadata,
	pub destino: Destination,
	pub busca_otimizada: SearchHints,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Terminal {
	pub tipo: String,
	pub descricao: String,
	pub codigo: String,
	pub nome: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
	pub tem_veiculo: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cor: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub marca: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub placa: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub descricao_completa: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub modelo: Option<String>,
	/// Present as `null` in some payloads.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub referencia: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Access {
	pub tempo_permanencia: Dwell,
	pub entrada: Movement,
	pub saida: Movement,
	pub status: String,
	pub ainda_dentro: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dwell {
	pub categoria: String,
	pub texto: String,
	pub minutos: f64,
	pub total_minutos: f64,
	pub horas: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
	pub datetime_completo: String,
	pub movimento: String,
	pub data: String,
	pub hora: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operators {
	pub logado: Operator,
	pub porteiro: Operator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
	pub nome: String,
	pub telefone: String,
	pub documento: String,
	pub turno: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
	pub codigo: f64,
	pub nome: String,
	pub nome_busca: String,
	pub tipo: String,
	pub documento: String,
	pub cidade: String,
	pub uf: String,
	pub endereco_completo: String,
	pub celular: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
	pub tem_destino: bool,
	pub morador: Resident,
	pub proprietario: Owner,
	pub residencia: Residence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resident {
	pub id: String,
	pub nome: String,
	pub documento: String,
	pub celular: String,
	pub email: String,
	pub tipo: String,
}

/// Every field is required but may be `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
	#[serde(deserialize_with = "required_nullable")]
	pub nome: Option<String>,
	#[serde(deserialize_with = "required_nullable")]
	pub telefone: Option<String>,
	#[serde(deserialize_with = "required_nullable")]
	pub celular: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Residence {
	pub id: String,
	pub rua: String,
	pub quadra: String,
	pub lote: String,
	pub numero: String,
	pub telefone: String,
	pub endereco_completo: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
	pub fonte_dados: String,
	pub periodo_dia: String,
	pub dia_semana: String,
	pub tem_destino: bool,
	pub tem_veiculo: bool,
	pub removido: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHints {
	pub texto_completo: String,
	pub nomes_relacionados: Vec<String>,
	pub palavras_chave: Vec<String>,
	pub documentos_relacionados: Vec<String>,
	pub datas_relacionadas: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayPeriod {
	Manha,
	Tarde,
	Noite,
}
impl DayPeriod {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Manha => "manha",
			Self::Tarde => "tarde",
			Self::Noite => "noite",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
	Segunda,
	Terca,
	Quarta,
	Quinta,
	Sexta,
	Sabado,
	Domingo,
}
impl Weekday {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Segunda => "segunda",
			Self::Terca => "terca",
			Self::Quarta => "quarta",
			Self::Quinta => "quinta",
			Self::Sexta => "sexta",
			Self::Sabado => "sabado",
			Self::Domingo => "domingo",
		}
	}
}

/// Free text plus structured predicates and pagination.
///
/// `limit` and `offset` always carry a value; absent arguments take the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub query: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub pessoa_nome: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub pessoa_documento: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub morador_nome: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub residencia_numero: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub residencia_rua: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub veiculo_placa: Option<String>,
	/// `YYYY-MM-DD`, inclusive.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data_inicio: Option<String>,
	/// `YYYY-MM-DD`, inclusive.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data_fim: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ainda_dentro: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub tem_veiculo: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub periodo_dia: Option<DayPeriod>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub dia_semana: Option<Weekday>,
	#[serde(default = "default_limit")]
	pub limit: u32,
	#[serde(default)]
	pub offset: u32,
}
impl SearchQuery {
	/// Free text, ignoring blank strings.
	pub fn free_text(&self) -> Option<&str> {
		present(&self.query)
	}

	/// Checks pagination bounds and date formats.
	pub fn validate(&self) -> Result<(), String> {
		if self.limit == 0 || self.limit > MAX_LIMIT {
			return Err(format!("limit must be in the range 1-{MAX_LIMIT}."));
		}
		if self.offset > MAX_OFFSET {
			return Err(format!("offset must not exceed {MAX_OFFSET}."));
		}

		for (name, value) in [("data_inicio", &self.data_inicio), ("data_fim", &self.data_fim)] {
			if let Some(raw) = present(value)
				&& Date::parse(raw, format_description!("[year]-[month]-[day]")).is_err()
			{
				return Err(format!("{name} must be a YYYY-MM-DD date."));
			}
		}

		Ok(())
	}
}
impl Default for SearchQuery {
	fn default() -> Self {
		Self {
			query: None,
			pessoa_nome: None,
			pessoa_documento: None,
			morador_nome: None,
			residencia_numero: None,
			residencia_rua: None,
			veiculo_placa: None,
			data_inicio: None,
			data_fim: None,
			ainda_dentro: None,
			tem_veiculo: None,
			periodo_dia: None,
			dia_semana: None,
			limit: default_limit(),
			offset: 0,
		}
	}
}

/// Trimmed value of an optional string, treating blank strings as absent.
pub fn present(value: &Option<String>) -> Option<&str> {
	value.as_deref().map(str::trim).filter(|raw| !raw.is_empty())
}

fn default_limit() -> u32 {
	10
}

fn required_nullable<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: serde::Deserializer<'de>,
{
	Option::<String>::deserialize(deserializer)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn search_query_materializes_pagination_defaults() {
		let query: SearchQuery =
			serde_json::from_value(serde_json::json!({ "pessoa_nome": "Ana" })).unwrap();

		assert_eq!(query.limit, 10);
		assert_eq!(query.offset, 0);
	}

	#[test]
	fn search_query_rejects_out_of_range_limit() {
		let query = SearchQuery { limit: 101, ..SearchQuery::default() };

		assert!(query.validate().is_err());
		assert!(SearchQuery { limit: 0, ..SearchQuery::default() }.validate().is_err());
	}

	#[test]
	fn search_query_bounds_the_offset() {
		let query = SearchQuery { offset: MAX_OFFSET, ..SearchQuery::default() };

		assert!(query.validate().is_ok());

		let query = SearchQuery { offset: u32::MAX, ..SearchQuery::default() };

		assert_eq!(query.validate(), Err(format!("offset must not exceed {MAX_OFFSET}.")));
	}

	#[test]
	fn search_query_rejects_malformed_dates() {
		let query =
			SearchQuery { data_inicio: Some("12/05/2025".to_string()), ..SearchQuery::default() };

		assert!(query.validate().is_err());

		let query =
			SearchQuery { data_fim: Some("2025-05-12".to_string()), ..SearchQuery::default() };

		assert!(query.validate().is_ok());
	}

	#[test]
	fn unknown_enum_values_fail_to_parse() {
		let result: serde_json::Result<SearchQuery> =
			serde_json::from_value(serde_json::json!({ "periodo_dia": "madrugada" }));

		assert!(result.is_err());
	}
}
