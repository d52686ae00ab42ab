use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

pub const CHUNK_TABLE: &str = "chunks";

/// One row per chunk: metadata columns plus the embedding, so both are
/// written by the same append.
pub fn build_chunk_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Int64, false),
		Field::new("source_type", DataType::Utf8, false),
		Field::new("source_id", DataType::Utf8, false),
		Field::new("content", DataType::Utf8, false),
		Field::new("metadata", DataType::Utf8, false),
		Field::new("created_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}

/// Embedding width of an existing chunk table schema.
pub fn vector_dim(schema: &Schema) -> Option<i32> {
	match schema.field_with_name("vector").ok()?.data_type() {
		DataType::FixedSizeList(_, dim) => Some(*dim),
		_ => None,
	}
}
