//! LanceDB connection helpers and row conversion for chunk tables.

use std::sync::Arc;

use arrow_array::types::Float32Type;
use arrow_array::{
	Array, ArrayRef, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
	TimestampMillisecondArray,
};
use arrow_schema::Schema;
use chrono::{DateTime, Utc};
use chunkdb_core::config::ColumnConfig;
use chunkdb_core::types::{Chunk, Metadata, Vector};
use chunkdb_core::{Error, Result};
use lancedb::{connect, Connection};

/// Distance column LanceDB appends to vector search results.
pub const DISTANCE_COLUMN: &str = "_distance";

pub async fn open_db(uri: &str) -> Result<Connection> { connect(uri).execute().await.map_err(Error::store) }

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<Schema>) -> Result<()> {
	let names = conn.table_names().execute().await.map_err(Error::store)?;
	if names.iter().any(|n| n == name) {
		return Ok(());
	}
	// create empty table with 0 rows
	let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
	conn.create_table(name, Box::new(iter)).execute().await.map_err(Error::store)?;
	Ok(())
}

/// A stored chunk as read back, with whatever extra columns the query produced.
#[derive(Debug, Clone)]
pub struct StoredRow {
	pub chunk: Chunk,
	pub vector: Option<Vector>,
	pub distance: Option<f32>,
}

pub fn chunk_to_batch(schema: Arc<Schema>, columns: &ColumnConfig, chunk: &Chunk, vector: &[f32]) -> Result<RecordBatch> {
	let mut arrays: Vec<ArrayRef> = vec![Arc::new(StringArray::from(vec![chunk.id.as_str()]))];
	if columns.content.is_some() {
		arrays.push(Arc::new(StringArray::from(vec![chunk.content.as_str()])));
	}
	if columns.metadata.is_some() {
		let json = serde_json::to_string(&chunk.metadata).map_err(Error::store)?;
		arrays.push(Arc::new(StringArray::from(vec![json])));
	}
	if columns.created_at.is_some() {
		arrays.push(Arc::new(TimestampMillisecondArray::from(vec![chunk.created_at.timestamp_millis()])));
	}
	let values: Vec<Option<f32>> = vector.iter().map(|&x| Some(x)).collect();
	arrays.push(Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
		vec![Some(values)],
		vector.len() as i32,
	)));
	RecordBatch::try_new(schema, arrays).map_err(Error::store)
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<Option<&'a T>> {
	match batch.column_by_name(name) {
		None => Ok(None),
		Some(col) => col
			.as_any()
			.downcast_ref::<T>()
			.map(Some)
			.ok_or_else(|| Error::store(format!("column '{name}' has unexpected type {}", col.data_type()))),
	}
}

fn required<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
	column(batch, name)?.ok_or_else(|| Error::store(format!("column '{name}' missing from result")))
}

pub fn batch_to_rows(batch: &RecordBatch, columns: &ColumnConfig) -> Result<Vec<StoredRow>> {
	let ids = required::<StringArray>(batch, &columns.id)?;
	let contents = match &columns.content { Some(name) => column::<StringArray>(batch, name)?, None => None };
	let metadata = match &columns.metadata { Some(name) => column::<StringArray>(batch, name)?, None => None };
	let created = match &columns.created_at { Some(name) => column::<TimestampMillisecondArray>(batch, name)?, None => None };
	let vectors = column::<FixedSizeListArray>(batch, &columns.vector)?;
	let distances = column::<Float32Array>(batch, DISTANCE_COLUMN)?;

	let mut rows = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		let meta: Metadata = match metadata {
			Some(col) if col.is_valid(i) => serde_json::from_str(col.value(i)).map_err(Error::store)?,
			_ => Metadata::new(),
		};
		let created_at = created
			.and_then(|col| DateTime::<Utc>::from_timestamp_millis(col.value(i)))
			.unwrap_or_default();
		let vector = match vectors {
			Some(list) if list.is_valid(i) => {
				let values = list.value(i);
				let floats = values
					.as_any()
					.downcast_ref::<Float32Array>()
					.ok_or_else(|| Error::store("vector column is not Float32"))?;
				Some(floats.values().to_vec())
			}
			_ => None,
		};
		rows.push(StoredRow {
			chunk: Chunk {
				id: ids.value(i).to_string(),
				content: contents.map(|c| c.value(i).to_string()).unwrap_or_default(),
				created_at,
				metadata: meta,
			},
			vector,
			distance: distances.map(|d| d.value(i)),
		});
	}
	Ok(rows)
}
