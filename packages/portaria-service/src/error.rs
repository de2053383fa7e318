pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Payload does not conform to the {schema} schema: {source}")]
	Validation {
		schema: &'static str,
		#[source]
		source: serde_json::Error,
	},
	#[error("Backend unavailable: {source}")]
	BackendUnavailable {
		#[from]
		source: portaria_storage::Error,
	},
	#[error("Embedding provider failed: {source}")]
	Provider {
		#[from]
		source: portaria_providers::Error,
	},
	#[error("Token reference {raw} does not name a document.")]
	AmbiguousReference { raw: String },
	#[error("{operation} failed: {source}")]
	Retrieval {
		operation: &'static str,
		#[source]
		source: Box<Error>,
	},
	#[error("Resolving steps for token {token_id} failed: {source}")]
	Resolution {
		token_id: String,
		#[source]
		source: Box<Error>,
	},
}
impl Error {
	pub(crate) fn invalid(message: impl Into<String>) -> Self {
		Self::InvalidRequest { message: message.into() }
	}

	pub(crate) fn retrieval(operation: &'static str) -> impl FnOnce(Self) -> Self {
		move |err| match err {
			Self::InvalidRequest { .. } => err,
			err => Self::Retrieval { operation, source: Box::new(err) },
		}
	}

	/// The innermost error, skipping `Retrieval` and `Resolution` wrappers.
	pub fn root(&self) -> &Self {
		match self {
			Self::Retrieval { source, .. } | Self::Resolution { source, .. } => source.root(),
			other => other,
		}
	}
}
impl From<portaria_domain::token_ref::AmbiguousReference> for Error {
	fn from(err: portaria_domain::token_ref::AmbiguousReference) -> Self {
		Self::AmbiguousReference { raw: err.raw }
	}
}
