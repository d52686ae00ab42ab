use anyhow::{ensure, Result};
use arrow_array::{FixedSizeListArray, Int64Array, RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use docrag_core::types::{ChunkId, NewChunk};

use crate::columns::{id_list, sql_literal};
use crate::schema::build_chunk_schema;
use crate::table::ChunkTable;

impl ChunkTable {
	/// Append `chunks` under `ids` in a single table version.
	pub async fn insert(&self, ids: &[ChunkId], chunks: &[NewChunk], created_at: DateTime<Utc>) -> Result<()> {
		ensure!(ids.len() == chunks.len(), "{} ids for {} chunks", ids.len(), chunks.len());
		if chunks.is_empty() { return Ok(()); }
		let record_batch = self.to_record_batch(ids, chunks, created_at)?;
		let schema = record_batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
		self.table.add(reader).execute().await?;
		tracing::debug!(rows = chunks.len(), first_id = ids[0], "chunk rows appended");
		Ok(())
	}

	pub async fn delete_ids(&self, ids: &[ChunkId]) -> Result<()> {
		if ids.is_empty() { return Ok(()); }
		self.table.delete(&format!("id IN ({})", id_list(ids))).await?;
		Ok(())
	}

	/// Remove a document's rows whose id is below `before`; `None` removes all of them.
	pub async fn delete_source(&self, source_id: &str, before: Option<ChunkId>) -> Result<()> {
		let mut predicate = format!("source_id = {}", sql_literal(source_id));
		if let Some(first_kept) = before {
			predicate.push_str(&format!(" AND id < {first_kept}"));
		}
		self.table.delete(&predicate).await?;
		Ok(())
	}

	fn to_record_batch(&self, ids: &[ChunkId], chunks: &[NewChunk], created_at: DateTime<Utc>) -> Result<RecordBatch> {
		let schema = build_chunk_schema(self.dim as i32);
		let mut source_types = Vec::with_capacity(chunks.len());
		let mut source_ids = Vec::with_capacity(chunks.len());
		let mut contents = Vec::with_capacity(chunks.len());
		let mut metadata = Vec::with_capacity(chunks.len());
		let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(chunks.len());
		for chunk in chunks {
			ensure!(chunk.embedding.len() == self.dim, "embedding has {} dimensions, store expects {}", chunk.embedding.len(), self.dim);
			source_types.push(chunk.source_type.clone());
			source_ids.push(chunk.source_id.clone());
			contents.push(chunk.content.clone());
			metadata.push(serde_json::to_string(&chunk.metadata)?);
			vectors.push(Some(chunk.embedding.iter().map(|&x| Some(x)).collect()));
		}
		let record_batch = RecordBatch::try_new(schema, vec![
			Arc::new(Int64Array::from(ids.to_vec())),
			Arc::new(StringArray::from(source_types)),
			Arc::new(StringArray::from(source_ids)),
			Arc::new(StringArray::from(contents)),
			Arc::new(StringArray::from(metadata)),
			Arc::new(TimestampMillisecondArray::from(vec![created_at.timestamp_millis(); chunks.len()])),
			Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), self.dim as i32)),
		])?;
		Ok(record_batch)
	}
}
