//! The public facade: ingestion, search dispatch and listing over one table.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chunkdb_core::config::{EngineConfig, TableConfig};
use chunkdb_core::traits::{CorpusStore, Embedder};
use chunkdb_core::types::{
    keys, matches_filter, Chunk, ChunkId, ChunkingMethod, DistanceMetric, FusionWeights, Metadata, MetadataFilter,
    Provenance, ScoredResult, SearchMethod, SelectOptions,
};
use chunkdb_core::{Chunker, Error, Result};
use chunkdb_text::{Bm25Scorer, LexicalHit};
use chunkdb_vector::{VectorHit, VectorScorer};
use futures::stream::{self, TryStreamExt};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::fusion;

const SOURCE_PREVIEW_CHARS: usize = 100;
const SIMILAR_CHUNKS_LIMIT: usize = 15;
const SIMILAR_CHUNKS_WEIGHTS: FusionWeights = FusionWeights { vector: 0.6, bm25: 0.4 };

/// Per-call overrides; `None` falls back to the engine's configured default.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub method: Option<SearchMethod>,
    pub limit: Option<usize>,
    pub weights: Option<FusionWeights>,
    pub filter: Option<MetadataFilter>,
    pub distance: Option<DistanceMetric>,
}

impl SearchOptions {
    pub fn method(mut self, method: SearchMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn weights(mut self, vector: f32, bm25: f32) -> Self {
        self.weights = Some(FusionWeights::new(vector, bm25));
        self
    }

    pub fn filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn distance(mut self, distance: DistanceMetric) -> Self {
        self.distance = Some(distance);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct AddTextOptions {
    pub chunking_method: Option<ChunkingMethod>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub count: usize,
    /// Ids of the stored chunks, in chunk order.
    pub ids: Vec<ChunkId>,
    pub batch_id: Option<String>,
}

/// Hybrid vector + BM25 search over one chunk table.
///
/// The engine is an explicit value: construct one per table and pass it
/// around. Every search is independent and only reads the store.
pub struct HybridSearchEngine<S> {
    store: S,
    embedder: Arc<dyn Embedder>,
    table: TableConfig,
    config: EngineConfig,
    chunker: Chunker,
    bm25: Bm25Scorer,
    ready: OnceCell<()>,
    sequence: AtomicU64,
}

async fn timed<T>(operation: &'static str, after: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout { operation, after }),
    }
}

fn source_preview(text: &str) -> String {
    let mut preview: String = text.chars().take(SOURCE_PREVIEW_CHARS).collect();
    preview.push_str("...");
    preview
}

impl<S: CorpusStore> HybridSearchEngine<S> {
    pub fn new(store: S, embedder: Arc<dyn Embedder>, table: TableConfig, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        if embedder.dim() != config.embedding.dimensions {
            return Err(Error::InvalidConfig(format!(
                "embedder '{}' produces {} dimensions, configured for {}",
                embedder.model_id(),
                embedder.dim(),
                config.embedding.dimensions
            )));
        }
        if let Some(bound) = store.table() {
            if *bound != table {
                return Err(Error::InvalidConfig(format!(
                    "store is bound to table '{}' with a different layout than '{}'",
                    bound.table_name, table.table_name
                )));
            }
        }
        Ok(Self {
            store,
            embedder,
            chunker: Chunker::new(config.chunking.fixed_size),
            table,
            config,
            bm25: Bm25Scorer::default(),
            ready: OnceCell::new(),
            sequence: AtomicU64::new(0),
        })
    }

    pub fn store(&self) -> &S { &self.store }

    pub fn table(&self) -> &TableConfig { &self.table }

    pub fn config(&self) -> &EngineConfig { &self.config }

    /// Prepare the store once per engine. Later calls are no-ops; a failed
    /// attempt is retried by the next call.
    pub async fn initialize(&self) -> Result<()> {
        self.ready
            .get_or_try_init(|| async {
                timed("ensure_ready", self.config.timeouts.store(), self.store.ensure_ready()).await?;
                info!(table = %self.table.table_name, "corpus store initialized");
                Ok::<(), Error>(())
            })
            .await?;
        Ok(())
    }

    pub fn chunk_text(&self, text: &str, method: Option<ChunkingMethod>) -> Vec<String> {
        self.chunker.chunk(text, method.unwrap_or(self.config.chunking.default_method))
    }

    #[instrument(skip(self, text, options), fields(chars = text.len()))]
    pub async fn add_text(&self, text: &str, options: AddTextOptions) -> Result<IngestReport> {
        if text.trim().is_empty() {
            return Err(Error::Validation("text is empty".into()));
        }
        let method = options.chunking_method.unwrap_or(self.config.chunking.default_method);
        let pieces = self.chunk_text(text, Some(method));
        let mut base = options.metadata;
        base.insert(keys::SOURCE_TEXT.into(), source_preview(text).into());
        base.insert(keys::CHUNKING_METHOD.into(), method.as_str().into());
        self.ingest(pieces, base, method).await
    }

    /// Store pre-split chunks as given. A `chunkingMethod` in `metadata` is kept.
    #[instrument(skip(self, chunks, metadata), fields(chunks = chunks.len()))]
    pub async fn add_chunks(&self, chunks: Vec<String>, metadata: Metadata) -> Result<IngestReport> {
        self.ingest(chunks, metadata, self.config.chunking.default_method).await
    }

    /// Ingest several texts concurrently under one `batchId`.
    pub async fn add_texts(&self, texts: &[String], options: AddTextOptions) -> Result<IngestReport> {
        let items: Vec<(String, Metadata)> = texts.iter().map(|t| (t.clone(), Metadata::new())).collect();
        self.add_texts_with_metadata(&items, options).await
    }

    /// [`Self::add_texts`] where each text carries its own metadata, merged
    /// over `options.metadata`.
    #[instrument(skip(self, texts, options), fields(texts = texts.len()))]
    pub async fn add_texts_with_metadata(&self, texts: &[(String, Metadata)], options: AddTextOptions) -> Result<IngestReport> {
        if texts.is_empty() || texts.iter().any(|(t, _)| t.trim().is_empty()) {
            return Err(Error::Validation("batch contains no text or an empty text".into()));
        }
        let batch_id = format!("batch-{}", &self.fingerprint(texts.iter().map(|(t, _)| t.as_str()), Utc::now())[..12]);

        let reports = futures::future::try_join_all(texts.iter().map(|(text, own)| {
            let mut options = options.clone();
            options.metadata.extend(own.clone());
            options.metadata.insert(keys::BATCH_ID.into(), batch_id.clone().into());
            self.add_text(text, options)
        }))
        .await?;
        let mut total = IngestReport { batch_id: Some(batch_id), ..Default::default() };
        for report in reports {
            total.count += report.count;
            total.ids.extend(report.ids);
        }
        info!(count = total.count, texts = texts.len(), "ingested batch");
        Ok(total)
    }

    async fn ingest(&self, pieces: Vec<String>, base: Metadata, method: ChunkingMethod) -> Result<IngestReport> {
        if pieces.is_empty() {
            return Err(Error::Validation("text produced no chunks".into()));
        }
        if pieces.iter().any(|p| p.trim().is_empty()) {
            return Err(Error::Validation("chunk content is empty".into()));
        }
        self.initialize().await?;

        let vectors = timed("embed_many", self.config.timeouts.embedding(), self.embedder.embed_many(&pieces)).await?;
        if vectors.len() != pieces.len() {
            return Err(Error::EmbeddingProvider(format!(
                "requested {} embeddings, received {}",
                pieces.len(),
                vectors.len()
            )));
        }

        let created_at = Utc::now();
        let prefix = self.fingerprint(pieces.iter().map(String::as_str), created_at);
        let total = pieces.len();
        let model = self.embedder.model_id().to_string();
        let chunks = pieces
            .into_iter()
            .enumerate()
            .map(|(i, content)| {
                let provenance = Provenance {
                    chunk_index: i,
                    total_chunks: total,
                    chunking_method: method,
                    embedding_model: model.clone(),
                    created_at,
                };
                Chunk::new(format!("{prefix}:{i}"), content, &provenance, &base)
            })
            .collect::<Result<Vec<_>>>()?;

        // Each insert is its own unit: rows written before a failure stay.
        let store_timeout = self.config.timeouts.store();
        stream::iter(chunks.iter().zip(&vectors).map(Ok::<_, Error>))
            .try_for_each_concurrent(self.config.ingest.concurrency, |(chunk, vector)| {
                timed("insert", store_timeout, self.store.insert(chunk, vector))
            })
            .await?;

        info!(count = total, %method, "ingested chunks");
        Ok(IngestReport { count: total, ids: chunks.into_iter().map(|c| c.id).collect(), batch_id: None })
    }

    fn fingerprint<'a>(&self, parts: impl IntoIterator<Item = &'a str>, at: DateTime<Utc>) -> String {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(part.as_bytes());
            hasher.update(&[0]);
        }
        hasher.update(&at.timestamp_micros().to_le_bytes());
        hasher.update(&self.sequence.fetch_add(1, Ordering::Relaxed).to_le_bytes());
        hasher.finalize().to_hex().as_str()[..16].to_string()
    }

    #[instrument(skip(self, options))]
    pub async fn search(&self, query: &str, options: SearchOptions) -> Result<Vec<ScoredResult>> {
        if query.trim().is_empty() {
            return Err(Error::Validation("query is empty".into()));
        }
        let method = options.method.unwrap_or(self.config.search.default_method);
        let limit = options.limit.unwrap_or(self.config.search.default_limit);
        if limit == 0 {
            return Err(Error::Validation("limit must be positive".into()));
        }
        let weights = options.weights.unwrap_or(self.config.search.weights);
        weights.validate()?;
        let metric = options.distance.unwrap_or(self.config.embedding.distance);
        if method != SearchMethod::Vector {
            self.table.content_column()?;
        }
        let filter = self.usable_filter(options.filter.as_ref());
        self.initialize().await?;

        let results = match method {
            SearchMethod::Vector => fusion::vector_results(self.vector_hits(query, metric, limit, filter).await?),
            SearchMethod::Bm25 => fusion::bm25_results(self.lexical_hits(query, limit, filter).await?),
            SearchMethod::Hybrid => {
                let (vector, lexical) = futures::try_join!(
                    self.vector_hits(query, metric, limit, filter),
                    self.lexical_hits(query, limit, filter)
                )?;
                debug!(vector = vector.len(), bm25 = lexical.len(), "fusing");
                fusion::fuse(fusion::vector_results(vector), fusion::bm25_results(lexical), weights, limit)
            }
        };
        debug!(%method, returned = results.len(), "search finished");
        Ok(results)
    }

    /// Hybrid search tuned for "more like this" lookups.
    pub async fn search_similar_chunks(&self, query: &str, limit: Option<usize>) -> Result<Vec<ScoredResult>> {
        let options = SearchOptions {
            method: Some(SearchMethod::Hybrid),
            limit: Some(limit.unwrap_or(SIMILAR_CHUNKS_LIMIT)),
            weights: Some(SIMILAR_CHUNKS_WEIGHTS),
            ..Default::default()
        };
        self.search(query, options).await
    }

    #[instrument(skip(self))]
    pub async fn select(&self, options: SelectOptions) -> Result<Vec<Chunk>> {
        if options.limit == 0 {
            return Err(Error::Validation("limit must be positive".into()));
        }
        let filter = self.usable_filter(options.filter.as_ref()).cloned();
        let options = SelectOptions { filter, ..options };
        self.initialize().await?;
        timed("select", self.config.timeouts.store(), self.store.select(&options)).await
    }

    fn usable_filter<'a>(&self, filter: Option<&'a MetadataFilter>) -> Option<&'a MetadataFilter> {
        match filter {
            Some(f) if f.is_empty() => None,
            Some(_) if self.table.columns.metadata.is_none() => {
                warn!(table = %self.table.table_name, "table has no metadata column; ignoring filter");
                None
            }
            other => other,
        }
    }

    async fn vector_hits(
        &self,
        query: &str,
        metric: DistanceMetric,
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorHit>> {
        let embedding = timed("embed_one", self.config.timeouts.embedding(), self.embedder.embed_one(query)).await?;
        let scorer = VectorScorer::new(metric);
        timed("vector_query", self.config.timeouts.store(), scorer.nearest(&self.store, &embedding, limit, filter)).await
    }

    async fn lexical_hits(&self, query: &str, limit: usize, filter: Option<&MetadataFilter>) -> Result<Vec<LexicalHit>> {
        let mut stats = timed("term_stats", self.config.timeouts.store(), self.store.term_stats(query)).await?;
        if let Some(filter) = filter {
            stats.matches.retain(|m| matches_filter(&m.chunk.metadata, filter));
        }
        Ok(self.bm25.rank(stats, limit))
    }
}
