//! LanceDB-backed persistent corpus store.
//!
//! Unfiltered nearest-neighbour queries run natively in LanceDB. Metadata is
//! stored as a JSON string, so filtered queries, term statistics and listings
//! scan the table and evaluate on the client.

use std::sync::Arc;

use arrow_array::RecordBatchIterator;
use arrow_schema::Schema;
use async_trait::async_trait;
use chunkdb_core::config::TableConfig;
use chunkdb_core::traits::CorpusStore;
use chunkdb_core::types::{matches_filter, Chunk, DistanceMetric, LexicalStats, MetadataFilter, SelectOptions};
use chunkdb_core::{Error, Result};
use chunkdb_text::{Analyzer, DocTerms, LexicalStatsBuilder};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use tracing::debug;

use crate::distance::distance;
use crate::schema::build_chunk_schema;
use crate::table::{batch_to_rows, chunk_to_batch, ensure_table, open_db, StoredRow};

pub struct LanceStore {
	conn: Connection,
	table: TableConfig,
	schema: Arc<Schema>,
	dim: usize,
	analyzer: Analyzer,
}

impl LanceStore {
	pub async fn open(uri: &str, table: TableConfig, dim: usize) -> Result<Self> {
		let conn = open_db(uri).await?;
		let schema = build_chunk_schema(&table.columns, dim);
		Ok(Self { conn, table, schema, dim, analyzer: Analyzer::new() })
	}

	pub async fn count(&self) -> Result<usize> {
		self.open_table().await?.count_rows(None).await.map_err(Error::store)
	}

	async fn open_table(&self) -> Result<Table> {
		self.conn.open_table(&self.table.table_name).execute().await.map_err(Error::store)
	}

	async fn scan(&self) -> Result<Vec<StoredRow>> {
		let table = self.open_table().await?;
		let mut stream = table.query().execute().await.map_err(Error::store)?;
		let mut rows = Vec::new();
		while let Some(batch) = stream.try_next().await.map_err(Error::store)? {
			rows.extend(batch_to_rows(&batch, &self.table.columns)?);
		}
		Ok(rows)
	}

	async fn native_vector_query(&self, query: &[f32], metric: DistanceMetric, limit: usize) -> Result<Vec<(Chunk, f32)>> {
		let table = self.open_table().await?;
		let mut stream = table
			.vector_search(query.to_vec())
			.map_err(Error::store)?
			.column(&self.table.columns.vector)
			.distance_type(lance_distance(metric))
			.limit(limit)
			.execute()
			.await
			.map_err(Error::store)?;
		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await.map_err(Error::store)? {
			for row in batch_to_rows(&batch, &self.table.columns)? {
				let raw = row.distance.ok_or_else(|| Error::store("vector search returned no distance column"))?;
				hits.push((row.chunk, from_lance_distance(metric, raw)));
			}
		}
		Ok(hits)
	}

	async fn scanned_vector_query(
		&self,
		query: &[f32],
		metric: DistanceMetric,
		filter: &MetadataFilter,
	) -> Result<Vec<(Chunk, f32)>> {
		let mut hits = Vec::new();
		for row in self.scan().await? {
			if !matches_filter(&row.chunk.metadata, filter) {
				continue;
			}
			if let Some(vector) = &row.vector {
				hits.push((row.chunk, distance(metric, query, vector)?));
			}
		}
		Ok(hits)
	}
}

fn lance_distance(metric: DistanceMetric) -> DistanceType {
	match metric {
		DistanceMetric::Cosine => DistanceType::Cosine,
		DistanceMetric::Euclidean => DistanceType::L2,
		DistanceMetric::InnerProduct => DistanceType::Dot,
	}
}

/// LanceDB reports squared L2 and `1 - a·b` for dot; bring both onto the
/// same scale as [`crate::distance::distance`].
fn from_lance_distance(metric: DistanceMetric, raw: f32) -> f32 {
	match metric {
		DistanceMetric::Cosine => raw,
		DistanceMetric::Euclidean => raw.max(0.0).sqrt(),
		DistanceMetric::InnerProduct => raw - 1.0,
	}
}

#[async_trait]
impl CorpusStore for LanceStore {
	fn table(&self) -> Option<&TableConfig> { Some(&self.table) }

	async fn ensure_ready(&self) -> Result<()> {
		ensure_table(&self.conn, &self.table.table_name, self.schema.clone()).await?;
		debug!(table = %self.table.table_name, dim = self.dim, "lance table ready");
		Ok(())
	}

	async fn insert(&self, chunk: &Chunk, vector: &[f32]) -> Result<()> {
		if vector.len() != self.dim {
			return Err(Error::store(format!("expected vector of dimension {}, got {}", self.dim, vector.len())));
		}
		let batch = chunk_to_batch(self.schema.clone(), &self.table.columns, chunk, vector)?;
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), self.schema.clone()));
		self.open_table().await?.add(reader).execute().await.map_err(Error::store)?;
		Ok(())
	}

	async fn vector_query(
		&self,
		query: &[f32],
		metric: DistanceMetric,
		limit: usize,
		filter: Option<&MetadataFilter>,
	) -> Result<Vec<(Chunk, f32)>> {
		let filter = match filter {
			Some(f) if self.table.columns.metadata.is_none() => {
				debug!(table = %self.table.table_name, keys = f.len(), "no metadata column; ignoring filter");
				None
			}
			other => other,
		};
		let mut hits = match filter {
			Some(f) => self.scanned_vector_query(query, metric, f).await?,
			None => self.native_vector_query(query, metric, limit).await?,
		};
		hits.sort_by(|a, b| a.1.total_cmp(&b.1));
		hits.truncate(limit);
		debug!(returned = hits.len(), %metric, filtered = filter.is_some(), "lance vector query");
		Ok(hits)
	}

	async fn term_stats(&self, query: &str) -> Result<LexicalStats> {
		self.table.content_column()?;
		let mut builder = LexicalStatsBuilder::new(self.analyzer.query_terms(query));
		for row in self.scan().await? {
			builder.add(&DocTerms::from_text(&self.analyzer, &row.chunk.content), &row.chunk);
		}
		Ok(builder.finish())
	}

	async fn select(&self, options: &SelectOptions) -> Result<Vec<Chunk>> {
		let rows = self
			.scan()
			.await?
			.into_iter()
			.map(|r| r.chunk)
			.filter(|c| options.filter.as_ref().map_or(true, |f| matches_filter(&c.metadata, f)))
			.collect();
		Ok(options.arrange(rows))
	}
}
