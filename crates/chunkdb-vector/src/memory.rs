//! In-process corpus store.
//!
//! Holds rows in insertion order behind a lock and answers every query by a
//! full scan. Suited to tests, the offline CLI mode and small corpora.

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;
use chunkdb_core::traits::CorpusStore;
use chunkdb_core::types::{matches_filter, Chunk, DistanceMetric, LexicalStats, MetadataFilter, SelectOptions, Vector};
use chunkdb_core::{Error, Result};
use chunkdb_text::{Analyzer, DocTerms, LexicalStatsBuilder};
use tracing::debug;

use crate::distance::distance;

struct Row {
	chunk: Chunk,
	vector: Vector,
	terms: DocTerms,
}

#[derive(Default)]
struct Rows {
	ids: HashSet<String>,
	rows: Vec<Row>,
}

pub struct MemoryStore {
	dim: usize,
	analyzer: Analyzer,
	inner: RwLock<Rows>,
}

impl MemoryStore {
	pub fn new(dim: usize) -> Self { Self { dim, analyzer: Analyzer::new(), inner: RwLock::new(Rows::default()) } }

	pub fn len(&self) -> usize { self.inner.read().map(|r| r.rows.len()).unwrap_or(0) }

	pub fn is_empty(&self) -> bool { self.len() == 0 }
}

fn poisoned<T>(_: T) -> Error { Error::store("memory store lock poisoned") }

#[async_trait]
impl CorpusStore for MemoryStore {
	async fn ensure_ready(&self) -> Result<()> { Ok(()) }

	async fn insert(&self, chunk: &Chunk, vector: &[f32]) -> Result<()> {
		if vector.len() != self.dim {
			return Err(Error::store(format!("expected vector of dimension {}, got {}", self.dim, vector.len())));
		}
		let terms = DocTerms::from_text(&self.analyzer, &chunk.content);
		let mut inner = self.inner.write().map_err(poisoned)?;
		if !inner.ids.insert(chunk.id.clone()) {
			return Err(Error::store(format!("duplicate chunk id '{}'", chunk.id)));
		}
		inner.rows.push(Row { chunk: chunk.clone(), vector: vector.to_vec(), terms });
		Ok(())
	}

	async fn vector_query(
		&self,
		query: &[f32],
		metric: DistanceMetric,
		limit: usize,
		filter: Option<&MetadataFilter>,
	) -> Result<Vec<(Chunk, f32)>> {
		let inner = self.inner.read().map_err(poisoned)?;
		let mut scored = Vec::new();
		for row in inner.rows.iter().filter(|r| filter.map_or(true, |f| matches_filter(&r.chunk.metadata, f))) {
			scored.push((row.chunk.clone(), distance(metric, query, &row.vector)?));
		}
		scored.sort_by(|a, b| a.1.total_cmp(&b.1));
		scored.truncate(limit);
		debug!(candidates = inner.rows.len(), returned = scored.len(), %metric, "memory vector query");
		Ok(scored)
	}

	async fn term_stats(&self, query: &str) -> Result<LexicalStats> {
		let inner = self.inner.read().map_err(poisoned)?;
		let mut builder = LexicalStatsBuilder::new(self.analyzer.query_terms(query));
		for row in &inner.rows { builder.add(&row.terms, &row.chunk); }
		Ok(builder.finish())
	}

	async fn select(&self, options: &SelectOptions) -> Result<Vec<Chunk>> {
		let inner = self.inner.read().map_err(poisoned)?;
		let rows = inner
			.rows
			.iter()
			.filter(|r| options.filter.as_ref().map_or(true, |f| matches_filter(&r.chunk.metadata, f)))
			.map(|r| r.chunk.clone())
			.collect();
		Ok(options.arrange(rows))
	}
}
