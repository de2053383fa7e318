use serde::Serialize;

use crate::PortariaService;

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
	pub connected: bool,
	pub collection: String,
	pub collection_exists: bool,
	pub server_version: Option<String>,
	pub points_count: Option<u64>,
	pub vector_size: Option<u64>,
	pub distance: Option<String>,
	/// Why the backend could not be reached.
	pub error: Option<String>,
}

impl PortariaService {
	/// Vector backend reachability and collection shape. An unreachable backend is
	/// reported in the result, never returned as an error.
	pub async fn connection_status(&self) -> ConnectionStatus {
		let collection = self.cfg.storage.qdrant.collection.clone();

		match self.backends.vectors.status().await {
			Ok(status) => ConnectionStatus {
				connected: true,
				collection: status.collection,
				collection_exists: status.exists,
				server_version: status.server_version,
				points_count: status.points_count,
				vector_size: status.vector_size,
				distance: status.distance,
				error: None,
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					collection = %collection,
					"Vector backend is unreachable."
				);

				ConnectionStatus {
					connected: false,
					collection,
					collection_exists: false,
					server_version: None,
					points_count: None,
					vector_size: None,
					distance: None,
					error: Some(err.to_string()),
				}
			},
		}
	}
}
