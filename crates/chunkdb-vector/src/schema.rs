use arrow_schema::{DataType, Field, Schema, TimeUnit};
use chunkdb_core::config::ColumnConfig;
use std::sync::Arc;

/// Arrow schema for a chunk table. Optional columns appear only when configured,
/// in the order id, content, metadata, created_at, vector.
pub fn build_chunk_schema(columns: &ColumnConfig, dim: usize) -> Arc<Schema> {
	let mut fields = vec![Field::new(&columns.id, DataType::Utf8, false)];
	if let Some(content) = &columns.content {
		fields.push(Field::new(content, DataType::Utf8, false));
	}
	if let Some(metadata) = &columns.metadata {
		// JSON-encoded metadata bag
		fields.push(Field::new(metadata, DataType::Utf8, true));
	}
	if let Some(created_at) = &columns.created_at {
		fields.push(Field::new(created_at, DataType::Timestamp(TimeUnit::Millisecond, None), false));
	}
	fields.push(Field::new(
		&columns.vector,
		DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32),
		true,
	));
	Arc::new(Schema::new(fields))
}
