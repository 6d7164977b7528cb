#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chunkdb_core::config::{EngineConfig, TableConfig};
use chunkdb_core::traits::{CorpusStore, Embedder};
use chunkdb_core::types::{Chunk, DistanceMetric, LexicalStats, MetadataFilter, SelectOptions, Vector};
use chunkdb_core::{Error, Result};
use chunkdb_hybrid::HybridSearchEngine;
use chunkdb_vector::MemoryStore;
use tokio::sync::Barrier;

pub const PANGRAMS: [&str; 5] = [
    "The quick brown fox jumps over the lazy dog",
    "Pack my box with five dozen liquor jugs",
    "How vexingly quick daft zebras jump",
    "The five boxing wizards jump quickly",
    "Sphinx of black quartz, judge my vow",
];

/// Maps words onto a handful of hand-picked concept axes so nearest
/// neighbours are predictable.
pub struct ConceptEmbedder;

pub const CONCEPT_DIM: usize = 6;

impl ConceptEmbedder {
    pub fn vector(text: &str) -> Vector {
        let mut v = vec![0f32; CONCEPT_DIM];
        v[CONCEPT_DIM - 1] = 0.1;
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let axis = match word.to_lowercase().as_str() {
                "animal" | "fox" | "dog" | "zebras" => Some(0),
                "jump" | "jumps" | "jumping" => Some(1),
                "quick" | "quickly" => Some(2),
                "pack" | "box" | "boxing" | "jugs" => Some(3),
                "five" | "dozen" => Some(4),
                _ => None,
            };
            if let Some(axis) = axis {
                v[axis] += 1.0;
            }
        }
        v
    }
}

#[async_trait]
impl Embedder for ConceptEmbedder {
    fn model_id(&self) -> &str { "concept-test" }

    fn dim(&self) -> usize { CONCEPT_DIM }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vector>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

/// Embedder that always fails, or stalls past any reasonable timeout.
pub enum BrokenEmbedder {
    Failing,
    Stalled,
}

#[async_trait]
impl Embedder for BrokenEmbedder {
    fn model_id(&self) -> &str { "broken" }

    fn dim(&self) -> usize { CONCEPT_DIM }

    async fn embed_many(&self, _texts: &[String]) -> Result<Vec<Vector>> {
        match self {
            Self::Failing => Err(Error::embedding("503 Service Unavailable")),
            Self::Stalled => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(Vec::new())
            }
        }
    }
}

/// Memory store that counts calls and can reject the n-th insert, stall one
/// operation, or hold both query legs until the other one is in flight.
pub struct ProbeStore {
    pub inner: MemoryStore,
    pub ready_calls: AtomicUsize,
    pub calls: AtomicUsize,
    inserts: AtomicUsize,
    fail_insert_at: Option<usize>,
    stall_on: Option<&'static str>,
    legs: Option<Arc<Barrier>>,
}

impl ProbeStore {
    pub fn new() -> Self { Self::failing_at(None) }

    pub fn failing_at(fail_insert_at: Option<usize>) -> Self {
        Self {
            inner: MemoryStore::new(CONCEPT_DIM),
            ready_calls: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            inserts: AtomicUsize::new(0),
            fail_insert_at,
            stall_on: None,
            legs: None,
        }
    }

    /// `operation` sleeps far past any test timeout.
    pub fn stalling(operation: &'static str) -> Self { Self { stall_on: Some(operation), ..Self::new() } }

    /// `vector_query` and `term_stats` each wait until the other has started.
    pub fn with_paired_legs() -> Self { Self { legs: Some(Arc::new(Barrier::new(2))), ..Self::new() } }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

    async fn enter(&self, operation: &'static str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.stall_on == Some(operation) {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        if let (Some(legs), "vector_query" | "term_stats") = (&self.legs, operation) {
            legs.wait().await;
        }
    }
}

#[async_trait]
impl CorpusStore for ProbeStore {
    async fn ensure_ready(&self) -> Result<()> {
        self.ready_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.ensure_ready().await
    }

    async fn insert(&self, chunk: &Chunk, vector: &[f32]) -> Result<()> {
        self.enter("insert").await;
        let n = self.inserts.fetch_add(1, Ordering::SeqCst);
        if Some(n) == self.fail_insert_at {
            return Err(Error::store("connection reset by peer"));
        }
        self.inner.insert(chunk, vector).await
    }

    async fn vector_query(
        &self,
        query: &[f32],
        metric: DistanceMetric,
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<(Chunk, f32)>> {
        self.enter("vector_query").await;
        self.inner.vector_query(query, metric, limit, filter).await
    }

    async fn term_stats(&self, query: &str) -> Result<LexicalStats> {
        self.enter("term_stats").await;
        self.inner.term_stats(query).await
    }

    async fn select(&self, options: &SelectOptions) -> Result<Vec<Chunk>> {
        self.enter("select").await;
        self.inner.select(options).await
    }
}

pub fn concept_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.embedding.dimensions = CONCEPT_DIM;
    config
}

pub fn engine_with<S: CorpusStore>(store: S, embedder: Arc<dyn Embedder>, table: TableConfig) -> HybridSearchEngine<S> {
    HybridSearchEngine::new(store, embedder, table, concept_config()).expect("engine")
}
