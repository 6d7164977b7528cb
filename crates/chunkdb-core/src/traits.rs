//! Ports to the two external collaborators: the embedding provider and the
//! corpus store.

use async_trait::async_trait;

use crate::config::TableConfig;
use crate::error::Result;
use crate::types::{Chunk, DistanceMetric, LexicalStats, MetadataFilter, SelectOptions, Vector};

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier recorded in each chunk's `embeddingModel` metadata.
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    /// Order-preserving: `result[i]` embeds `texts[i]`.
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vector>>;

    async fn embed_one(&self, text: &str) -> Result<Vector> {
        let mut vectors = self.embed_many(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| crate::Error::EmbeddingProvider("provider returned no vector".into()))
    }
}

#[async_trait]
pub trait CorpusStore: Send + Sync {
    /// Physical table layout, for stores bound to one. An engine over such a
    /// store must be constructed with the same layout.
    fn table(&self) -> Option<&TableConfig> { None }

    /// Create whatever the store needs before the first insert or query.
    /// Must be safe to call repeatedly.
    async fn ensure_ready(&self) -> Result<()>;

    /// Durably store one chunk with its vector. Each call is its own unit.
    async fn insert(&self, chunk: &Chunk, vector: &[f32]) -> Result<()>;

    /// Nearest neighbours, ascending by distance ("smaller is closer" for
    /// every metric), at most `limit` rows.
    async fn vector_query(
        &self,
        query: &[f32],
        metric: DistanceMetric,
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<(Chunk, f32)>>;

    /// Term statistics for the store's tokenization of `query`.
    async fn term_stats(&self, query: &str) -> Result<LexicalStats>;

    async fn select(&self, options: &SelectOptions) -> Result<Vec<Chunk>>;
}
