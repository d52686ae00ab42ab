use thiserror::Error;

/// Failure taxonomy shared by every retrieval component.
///
/// Recovery is decided by the caller: `Fetch` and `IndexQuery` are absorbed
/// locally (zero chunks, zero lexical matches), `Embedding` aborts the
/// operation in progress, `Consistency` is never retried.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to fetch '{source_id}': {reason}")]
    Fetch { source_id: String, reason: String },

    #[error("Embedding backend unavailable: {0}")]
    Embedding(String),

    #[error("Malformed keyword query: {0}")]
    IndexQuery(String),

    #[error("Index consistency violated: {0}")]
    Consistency(String),

    #[error("Storage failure: {0}")]
    Storage(String),
}

impl Error {
    pub fn fetch(source_id: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Fetch { source_id: source_id.into(), reason: reason.to_string() }
    }

    /// Wraps an engine error (tantivy, lancedb, io) keeping its cause chain.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(format!("{err:#}"))
    }

    pub fn embedding(err: impl std::fmt::Display) -> Self {
        Self::Embedding(format!("{err:#}"))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Consistency(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
