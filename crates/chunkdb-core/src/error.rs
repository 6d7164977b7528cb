use std::time::Duration;

use thiserror::Error;

/// Every failure the retrieval core can surface.
///
/// Callers match on the variant to pick a retry policy; see
/// [`Error::is_retryable`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown chunking method: {0}")]
    Chunking(String),

    #[error("Embedding provider failed: {0}")]
    EmbeddingProvider(String),

    #[error("Corpus store failed: {0}")]
    Store(String),

    #[error("Table '{0}' has no content column to score against")]
    ContentColumnMissing(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: &'static str, after: Duration },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub fn store(err: impl std::fmt::Display) -> Self { Self::Store(err.to_string()) }

    pub fn embedding(err: impl std::fmt::Display) -> Self { Self::EmbeddingProvider(err.to_string()) }

    /// Remote-side failures may succeed on a later attempt; caller faults never do.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EmbeddingProvider(_) | Self::Store(_) | Self::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
