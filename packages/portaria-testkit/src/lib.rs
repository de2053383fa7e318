#![recursion_limit = "256"]

mod error;

pub use error::{Error, Result};

use std::{env, thread, time::Duration};

use qdrant_client::{
	Payload, Qdrant,
	qdrant::{
		CreateCollectionBuilder, Distance, PointStruct, UpsertPointsBuilder, VectorParamsBuilder,
	},
};
use serde_json::{Value, json};
use tokio::{runtime::Builder, time};
use uuid::Uuid;

pub const SAMPLE_CONFIG_TOML: &str = include_str!("fixtures/sample_config.toml");

/// A collection with a random name that is deleted on drop.
pub struct ScratchCollection {
	pub client: Qdrant,
	pub name: String,
	url: String,
	cleaned: bool,
}
impl ScratchCollection {
	pub async fn create(url: &str, vector_dim: u64) -> Result<Self> {
		let client = Qdrant::from_url(url).build()?;
		let name = format!("portaria_test_{}", Uuid::new_v4().simple());

		client
			.create_collection(
				CreateCollectionBuilder::new(name.clone())
					.vectors_config(VectorParamsBuilder::new(vector_dim, Distance::Cosine)),
			)
			.await?;

		Ok(Self { client, name, url: url.to_string(), cleaned: false })
	}

	/// Upserts `(id, vector, payload)` triples and waits for them to be indexed.
	pub async fn seed(&self, points: Vec<(u64, Vec<f32>, Value)>) -> Result<()> {
		let points = points
			.into_iter()
			.map(|(id, vector, payload)| PointStruct::new(id, vector, to_payload(payload)))
			.collect::<Vec<_>>();

		self.client
			.upsert_points(UpsertPointsBuilder::new(self.name.clone(), points).wait(true))
			.await?;

		Ok(())
	}

	pub async fn cleanup(mut self) -> Result<()> {
		delete_collection(&self.url, &self.name).await?;

		self.cleaned = true;

		Ok(())
	}
}
impl Drop for ScratchCollection {
	fn drop(&mut self) {
		if self.cleaned {
			return;
		}

		let url = self.url.clone();
		let name = self.name.clone();
		let cleanup_thread = thread::spawn(move || {
			let runtime = match Builder::new_current_thread().enable_all().build() {
				Ok(runtime) => runtime,
				Err(err) => {
					eprintln!("Scratch collection cleanup failed: {err}.");

					return;
				},
			};

			if let Err(err) = runtime.block_on(delete_collection(&url, &name)) {
				eprintln!("Scratch collection cleanup failed: {err}.");
			}
		});
		let _ = cleanup_thread.join();
	}
}

pub fn env_qdrant_url() -> Option<String> {
	env::var("PORTARIA_QDRANT_URL").ok()
}

/// The bundled sample configuration, parsed and validated.
pub fn sample_config() -> Result<portaria_config::Config> {
	let cfg: portaria_config::Config = toml::from_str(SAMPLE_CONFIG_TOML)
		.map_err(|err| Error::Message(format!("Failed to parse sample config: {err}.")))?;

	portaria_config::validate(&cfg)?;

	Ok(cfg)
}

/// A complete access-record payload as the ingestion pipeline indexes it.
pub fn access_record_payload(id: &str, pessoa_nome: &str) -> Value {
	json!({
		"id": id,
		"tipo_registro": "acesso",
		"fonte_dados": "portaria_sistema",
		"timestamp_indexacao": "2025-05-12T18:00:00Z",
		"text_for_embedding": format!("Visitante {pessoa_nome} entrou no condomínio."),
		"pessoa_nome": pessoa_nome,
		"pessoa_documento": "12345678900",
		"pessoa_cidade": "CAMPINAS",
		"pessoa_uf": "SP",
		"morador_id": "M-236",
		"morador_nome": "CARLOS LIMA",
		"tem_destino": true,
		"residencia_numero": "236",
		"residencia_rua": "RUA DAS ACACIAS",
		"residencia_endereco": "RUA DAS ACACIAS, 236",
		"tem_veiculo": true,
		"terminal_nome": "PORTARIA PRINCIPAL",
		"terminal_codigo": "T01",
		"entrada_data": "2025-05-12",
		"entrada_hora": "08:15:00",
		"entrada_datetime": "2025-05-12T08:15:00",
		"saida_data": "2025-05-12",
		"saida_hora": "10:45:00",
		"saida_datetime": "2025-05-12T10:45:00",
		"tempo_permanencia_minutos": 150,
		"periodo_dia": "manha",
		"dia_semana": "segunda",
		"status_acesso": "finalizado",
		"ainda_dentro": false,
		"original_record": {
			"id": id,
			"tipo_registro": "acesso",
			"timestamp_indexacao": "2025-05-12T18:00:00Z",
			"conteudo_principal": format!("{pessoa_nome} visitou CARLOS LIMA"),
			"terminal": {
				"tipo": "entrada",
				"descricao": "Portaria principal",
				"codigo": "T01",
				"nome": "PORTARIA PRINCIPAL",
			},
			"veiculo": {
				"tem_veiculo": true,
				"cor": "PRATA",
				"marca": "FIAT",
				"placa": "ABC1D23",
				"modelo": "UNO",
				"referencia": null,
			},
			"acesso": {
				"tempo_permanencia": {
					"categoria": "media",
					"texto": "2h30min",
					"minutos": 30,
					"total_minutos": 150,
					"horas": 2,
				},
				"entrada": {
					"datetime_completo": "2025-05-12T08:15:00",
					"movimento": "entrada",
					"data": "2025-05-12",
					"hora": "08:15:00",
				},
				"saida": {
					"datetime_completo": "2025-05-12T10:45:00",
					"movimento": "saida",
					"data": "2025-05-12",
					"hora": "10:45:00",
				},
				"status": "finalizado",
				"ainda_dentro": false,
			},
			"usuarios": {
				"logado": operator("ANA PORTEIRA"),
				"porteiro": operator("JOSE PORTEIRO"),
			},
			"pessoa": {
				"uf": "SP",
				"nome_busca": pessoa_nome.to_lowercase(),
				"tipo": "visitante",
				"codigo": 991,
				"nome": pessoa_nome,
				"cidade": "CAMPINAS",
				"documento": "12345678900",
				"endereco_completo": "RUA DO VISITANTE, 10",
				"celular": "19999990000",
			},
			"metadados": {
				"tem_destino": true,
				"fonte_dados": "portaria_sistema",
				"periodo_dia": "manha",
				"removido": false,
				"tem_veiculo": true,
				"dia_semana": "segunda",
			},
			"destino": {
				"tem_destino": true,
				"morador": {
					"documento": "98765432100",
					"id": "M-236",
					"celular": "19988887777",
					"nome": "CARLOS LIMA",
					"email": "carlos@example.com",
					"tipo": "morador",
				},
				"proprietario": { "telefone": null, "nome": "CARLOS LIMA", "celular": null },
				"residencia": {
					"rua": "RUA DAS ACACIAS",
					"quadra": "B",
					"id": "R-236",
					"telefone": "1933334444",
					"endereco_completo": "RUA DAS ACACIAS, 236",
					"numero": "236",
					"lote": "12",
				},
			},
			"busca_otimizada": {
				"nomes_relacionados": [pessoa_nome, "CARLOS LIMA"],
				"texto_completo": format!("{pessoa_nome} CARLOS LIMA RUA DAS ACACIAS"),
				"palavras_chave": ["visita", "portaria"],
				"documentos_relacionados": ["12345678900"],
				"datas_relacionadas": ["2025-05-12"],
			},
		},
	})
}

/// A step document shaped like the tracking writers persist them.
pub fn step_document(token_ref: Value, latitude: f64, longitude: f64, speed_kmh: f64) -> Value {
	json!({
		"tokenRef": token_ref,
		"last_position": { "latitude": latitude, "longitude": longitude },
		"last_speed_kmh": speed_kmh,
		"last_updated": "2025-05-12T10:00:00Z",
	})
}

fn operator(name: &str) -> Value {
	json!({ "nome": name, "telefone": "1930000000", "documento": "11122233344", "turno": "diurno" })
}

fn to_payload(value: Value) -> Payload {
	let mut payload = Payload::new();

	if let Value::Object(object) = value {
		for (key, value) in object {
			payload.insert(key, value);
		}
	}

	payload
}

async fn delete_collection(url: &str, name: &str) -> Result<()> {
	let client = Qdrant::from_url(url).build()?;

	time::timeout(Duration::from_secs(10), client.delete_collection(name.to_string()))
		.await
		.map_err(|_| Error::Message(format!("Timed out deleting Qdrant collection {name:?}.")))??;

	Ok(())
}
