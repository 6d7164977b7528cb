//! chunkdb-text
//!
//! Lexical side of retrieval: the tantivy token pipeline every store uses to
//! tokenize documents and queries, per-query term statistics, and BM25 scoring.
pub mod analyzer;
pub mod bm25;
pub mod stats;

pub use analyzer::Analyzer;
pub use bm25::{Bm25Params, Bm25Scorer, LexicalHit};
pub use stats::{DocTerms, LexicalStatsBuilder};
