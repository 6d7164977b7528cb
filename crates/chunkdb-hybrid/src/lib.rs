//! Hybrid retrieval: vector and BM25 rankings fused into one result list.

pub mod engine;
pub mod fusion;

pub use engine::{AddTextOptions, HybridSearchEngine, IngestReport, SearchOptions};
