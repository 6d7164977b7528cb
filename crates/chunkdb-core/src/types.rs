//! Domain types shared by the chunker, the corpus stores and the fusion engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub type ChunkId = String;
pub type Vector = Vec<f32>;

/// Metadata keys stamped on every chunk at ingestion time.
pub mod keys {
    pub const CHUNK_INDEX: &str = "chunkIndex";
    pub const TOTAL_CHUNKS: &str = "totalChunks";
    pub const CHUNKING_METHOD: &str = "chunkingMethod";
    pub const EMBEDDING_MODEL: &str = "embeddingModel";
    pub const DATE: &str = "date";
    pub const SOURCE_TEXT: &str = "sourceText";
    pub const BATCH_ID: &str = "batchId";
}

/// A scalar stored in a chunk's metadata bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl MetadataValue {
    /// Text form of the value, the way a JSON `->>` projection renders it.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Number(n) if n.is_finite() && n.fract() == 0.0 => Some(format!("{}", *n as i64)),
            Self::Number(n) => Some(n.to_string()),
            Self::String(s) => Some(s.clone()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self { Self::String(s) => Some(s), _ => None }
    }

    pub fn as_usize(&self) -> Option<usize> {
        match self {
            Self::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as usize),
            Self::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Exact-match test used by metadata filters.
    ///
    /// Values match when equal, or when their text forms are equal, so a
    /// filter value of `"0"` selects a stored number `0`.
    pub fn matches(&self, expected: &MetadataValue) -> bool {
        if self == expected { return true; }
        match (self.as_text(), expected.as_text()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for MetadataValue { fn from(v: &str) -> Self { Self::String(v.to_string()) } }
impl From<String> for MetadataValue { fn from(v: String) -> Self { Self::String(v) } }
impl From<bool> for MetadataValue { fn from(v: bool) -> Self { Self::Bool(v) } }
impl From<f64> for MetadataValue { fn from(v: f64) -> Self { Self::Number(v) } }
impl From<i64> for MetadataValue { fn from(v: i64) -> Self { Self::Number(v as f64) } }
impl From<usize> for MetadataValue { fn from(v: usize) -> Self { Self::Number(v as f64) } }

pub type Metadata = BTreeMap<String, MetadataValue>;

/// Conjunction of exact-match predicates over a metadata bag.
pub type MetadataFilter = BTreeMap<String, MetadataValue>;

/// True when every `(key, value)` in `filter` is present in `metadata`.
pub fn matches_filter(metadata: &Metadata, filter: &MetadataFilter) -> bool {
    filter.iter().all(|(key, expected)| metadata.get(key).is_some_and(|v| v.matches(expected)))
}

/// How text is split into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingMethod {
    Sentence,
    Paragraph,
    Fixed,
}

impl ChunkingMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sentence => "sentence",
            Self::Paragraph => "paragraph",
            Self::Fixed => "fixed",
        }
    }
}

impl fmt::Display for ChunkingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for ChunkingMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sentence" => Ok(Self::Sentence),
            "paragraph" => Ok(Self::Paragraph),
            "fixed" => Ok(Self::Fixed),
            _ => Err(Error::Chunking(s.to_string())),
        }
    }
}

/// Which ranking path a search takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    Vector,
    Bm25,
    Hybrid,
}

impl fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { Self::Vector => "vector", Self::Bm25 => "bm25", Self::Hybrid => "hybrid" })
    }
}

impl FromStr for SearchMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vector" => Ok(Self::Vector),
            "bm25" => Ok(Self::Bm25),
            "hybrid" => Ok(Self::Hybrid),
            _ => Err(Error::Validation(format!("unknown search method '{s}'"))),
        }
    }
}

/// Vector dissimilarity. Every metric is reported as "smaller is closer".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Cosine,
    Euclidean,
    InnerProduct,
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { Self::Cosine => "cosine", Self::Euclidean => "euclidean", Self::InnerProduct => "inner_product" })
    }
}

impl FromStr for DistanceMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "euclidean" | "l2" => Ok(Self::Euclidean),
            "inner_product" | "dot" => Ok(Self::InnerProduct),
            _ => Err(Error::Validation(format!("unknown distance metric '{s}'"))),
        }
    }
}

/// Linear fusion weights. Used as given, never renormalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub vector: f32,
    pub bm25: f32,
}

impl Default for FusionWeights {
    fn default() -> Self { Self { vector: 0.7, bm25: 0.3 } }
}

impl FusionWeights {
    pub fn new(vector: f32, bm25: f32) -> Self { Self { vector, bm25 } }

    pub fn validate(&self) -> Result<()> {
        for (name, w) in [("vector", self.vector), ("bm25", self.bm25)] {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::Validation(format!("{name} weight must be a non-negative number, got {w}")));
            }
        }
        Ok(())
    }
}

/// Where a chunk came from; stamped into its metadata at ingestion.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub chunking_method: ChunkingMethod,
    pub embedding_model: String,
    pub created_at: DateTime<Utc>,
}

impl Provenance {
    fn stamp(&self, metadata: &mut Metadata) {
        metadata.insert(keys::CHUNK_INDEX.into(), self.chunk_index.into());
        metadata.insert(keys::TOTAL_CHUNKS.into(), self.total_chunks.into());
        metadata.insert(keys::EMBEDDING_MODEL.into(), self.embedding_model.clone().into());
        metadata.insert(keys::DATE.into(), self.created_at.to_rfc3339().into());
        metadata.entry(keys::CHUNKING_METHOD.into()).or_insert_with(|| self.chunking_method.as_str().into());
    }
}

/// A contiguous slice of source text, immutable once stored.
///
/// `metadata` is the full bag as stored: caller-supplied keys plus the
/// provenance keys in [`keys`]. Typed accessors read provenance back out of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub id: ChunkId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub metadata: Metadata,
}

impl Chunk {
    /// Build a chunk for ingestion, stamping provenance over `base` metadata.
    ///
    /// A `chunkingMethod` already present in `base` is kept.
    pub fn new(id: impl Into<ChunkId>, content: impl Into<String>, provenance: &Provenance, base: &Metadata) -> Result<Self> {
        if provenance.chunk_index >= provenance.total_chunks {
            return Err(Error::Validation(format!(
                "chunk index {} out of range for {} chunks",
                provenance.chunk_index, provenance.total_chunks
            )));
        }
        let content = content.into();
        if content.trim().is_empty() {
            return Err(Error::Validation("chunk content is empty".into()));
        }
        let mut metadata = base.clone();
        provenance.stamp(&mut metadata);
        Ok(Self { id: id.into(), content, created_at: provenance.created_at, metadata })
    }

    pub fn chunk_index(&self) -> Option<usize> { self.metadata.get(keys::CHUNK_INDEX).and_then(MetadataValue::as_usize) }

    pub fn total_chunks(&self) -> Option<usize> { self.metadata.get(keys::TOTAL_CHUNKS).and_then(MetadataValue::as_usize) }

    pub fn chunking_method(&self) -> Option<ChunkingMethod> {
        self.metadata.get(keys::CHUNKING_METHOD).and_then(MetadataValue::as_str).and_then(|s| s.parse().ok())
    }

    pub fn embedding_model(&self) -> Option<&str> { self.metadata.get(keys::EMBEDDING_MODEL).and_then(MetadataValue::as_str) }
}

/// One row of a search response. Lives only for the duration of a call.
///
/// Score fields are present only when the producing path computed them:
/// vector search sets `distance` and `vector_score`, BM25 sets `bm25_raw` and
/// `bm25_score`, hybrid fusion sets all score fields plus `combined_score`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredResult {
    #[serde(flatten)]
    pub chunk: Chunk,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bm25_raw: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bm25_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combined_score: Option<f32>,
}

impl ScoredResult {
    pub fn new(chunk: Chunk) -> Self {
        Self { chunk, distance: None, vector_score: None, bm25_raw: None, bm25_score: None, combined_score: None }
    }

    pub fn id(&self) -> &str { &self.chunk.id }

    pub fn content(&self) -> &str { &self.chunk.content }
}

/// Per-document term statistics for a lexical query.
#[derive(Debug, Clone, PartialEq)]
pub struct TermMatch {
    pub chunk: Chunk,
    /// Token count of the document, same unit as [`LexicalStats::avg_doc_len`].
    pub doc_len: usize,
    pub term_freqs: HashMap<String, usize>,
}

/// Corpus-wide aggregates sufficient to evaluate BM25 for one query.
///
/// `matches` holds only documents containing at least one query term.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LexicalStats {
    pub total_docs: usize,
    pub avg_doc_len: f32,
    pub query_terms: Vec<String>,
    pub doc_freqs: HashMap<String, usize>,
    pub matches: Vec<TermMatch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderBy {
    CreatedAt,
    ChunkIndex,
    Content,
}

impl FromStr for OrderBy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "createdAt" | "created_at" => Ok(Self::CreatedAt),
            "chunkIndex" | "chunk_index" => Ok(Self::ChunkIndex),
            "content" => Ok(Self::Content),
            _ => Err(Error::Validation(format!("cannot order by '{s}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Unscored listing of stored chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectOptions {
    pub limit: usize,
    pub filter: Option<MetadataFilter>,
    pub order_by: Option<OrderBy>,
    pub order: SortOrder,
}

impl Default for SelectOptions {
    fn default() -> Self { Self { limit: 10, filter: None, order_by: None, order: SortOrder::Asc } }
}

impl SelectOptions {
    /// Apply ordering and the limit to rows already in insertion order.
    pub fn arrange(&self, mut rows: Vec<Chunk>) -> Vec<Chunk> {
        if let Some(order_by) = self.order_by {
            rows.sort_by(|a, b| {
                let ord = match order_by {
                    OrderBy::CreatedAt => a.created_at.cmp(&b.created_at),
                    OrderBy::ChunkIndex => a.chunk_index().cmp(&b.chunk_index()),
                    OrderBy::Content => a.content.cmp(&b.content),
                };
                match self.order { SortOrder::Asc => ord, SortOrder::Desc => ord.reverse() }
            });
        }
        rows.truncate(self.limit);
        rows
    }
}
