pub mod filter;
pub mod heatmap;
pub mod search;
pub mod status;
pub mod tracking;

mod error;

pub use error::{Error, Result};
pub use heatmap::HeatmapRequest;
pub use search::{AccessPage, TextSearchRequest};
pub use status::ConnectionStatus;
pub use tracking::{ResolvedSteps, ResolvedVia, TokenTracking, VisitorTracking};

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

use portaria_config::{Config, EmbeddingProviderConfig};
use portaria_domain::predicate::FilterPredicate;
use portaria_storage::{
	firestore::{FieldFilter, FirestoreStore, StoredDocument},
	qdrant::{CollectionStatus, QdrantStore, ScoredPayload, VectorSearch},
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed_query<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, Result<Vec<f32>>>;
}

pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn search<'a>(&'a self, request: VectorSearch) -> BoxFuture<'a, Result<Vec<ScoredPayload>>>;

	fn scroll<'a>(
		&'a self,
		filter: Option<&'a FilterPredicate>,
		limit: u32,
		offset: u32,
	) -> BoxFuture<'a, Result<Vec<Value>>>;

	fn status<'a>(&'a self) -> BoxFuture<'a, Result<CollectionStatus>>;
}

pub trait DocumentStore
where
	Self: Send + Sync,
{
	fn get<'a>(
		&'a self,
		collection: &'a str,
		id: &'a str,
	) -> BoxFuture<'a, Result<Option<StoredDocument>>>;

	fn list<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<Vec<StoredDocument>>>;

	fn query<'a>(
		&'a self,
		collection: &'a str,
		filters: &'a [FieldFilter],
		limit: Option<u32>,
	) -> BoxFuture<'a, Result<Vec<StoredDocument>>>;
}

#[derive(Clone)]
pub struct Backends {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub vectors: Arc<dyn VectorIndex>,
	pub documents: Arc<dyn DocumentStore>,
}
impl Backends {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		vectors: Arc<dyn VectorIndex>,
		documents: Arc<dyn DocumentStore>,
	) -> Self {
		Self { embedding, vectors, documents }
	}

	/// Qdrant, Firestore, and the HTTP embedding provider described by `cfg`.
	pub fn from_config(cfg: &Config) -> Result<Self> {
		Ok(Self {
			embedding: Arc::new(DefaultEmbedding),
			vectors: Arc::new(QdrantStore::new(&cfg.storage.qdrant)?),
			documents: Arc::new(FirestoreStore::new(&cfg.storage.firestore)?),
		})
	}
}

pub struct PortariaService {
	pub cfg: Config,
	pub backends: Backends,
}
impl PortariaService {
	pub fn new(cfg: Config) -> Result<Self> {
		let backends = Backends::from_config(&cfg)?;

		Ok(Self { cfg, backends })
	}

	pub fn with_backends(cfg: Config, backends: Backends) -> Self {
		Self { cfg, backends }
	}

	pub(crate) async fn embed(&self, text: &str) -> Result<Vec<f32>> {
		self.backends.embedding.embed_query(&self.cfg.providers.embedding, text).await
	}
}

struct DefaultEmbedding;
impl EmbeddingProvider for DefaultEmbedding {
	fn embed_query<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move { Ok(portaria_providers::embedding::embed_query(cfg, text).await?) })
	}
}

impl VectorIndex for QdrantStore {
	fn search<'a>(&'a self, request: VectorSearch) -> BoxFuture<'a, Result<Vec<ScoredPayload>>> {
		Box::pin(async move { Ok(QdrantStore::search(self, request).await?) })
	}

	fn scroll<'a>(
		&'a self,
		filter: Option<&'a FilterPredicate>,
		limit: u32,
		offset: u32,
	) -> BoxFuture<'a, Result<Vec<Value>>> {
		Box::pin(async move { Ok(QdrantStore::scroll(self, filter, limit, offset).await?) })
	}

	fn status<'a>(&'a self) -> BoxFuture<'a, Result<CollectionStatus>> {
		Box::pin(async move { Ok(self.collection_status().await?) })
	}
}

impl DocumentStore for FirestoreStore {
	fn get<'a>(
		&'a self,
		collection: &'a str,
		id: &'a str,
	) -> BoxFuture<'a, Result<Option<StoredDocument>>> {
		Box::pin(async move { Ok(FirestoreStore::get(self, collection, id).await?) })
	}

	fn list<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<Vec<StoredDocument>>> {
		Box::pin(async move { Ok(FirestoreStore::list(self, collection).await?) })
	}

	fn query<'a>(
		&'a self,
		collection: &'a str,
		filters: &'a [FieldFilter],
		limit: Option<u32>,
	) -> BoxFuture<'a, Result<Vec<StoredDocument>>> {
		Box::pin(async move { Ok(FirestoreStore::query(self, collection, filters, limit).await?) })
	}
}
