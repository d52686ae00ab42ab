use anyhow::{anyhow, Result};
use arrow_array::{Float32Array, Int64Array, RecordBatch, StringArray, TimestampMillisecondArray};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::DistanceType;
use std::collections::{BTreeSet, HashMap};

use docrag_core::types::{ChunkId, ChunkRecord, Meta, ScoreTable, SourceKind};

use crate::columns::{column, id_list, sql_literal};
use crate::table::ChunkTable;

impl ChunkTable {
	/// Nearest `limit` chunks to `q_vec` as `id -> cosine distance`, closest first.
	///
	/// Exhaustive (flat) search; returns an empty table when the store is empty
	/// or `q_vec` has the wrong dimension.
	pub async fn search_vec(&self, q_vec: &[f32], limit: usize) -> Result<ScoreTable> {
		let mut hits = ScoreTable::new(SourceKind::Vector);
		if q_vec.len() != self.dim {
			tracing::warn!(query_dim = q_vec.len(), store_dim = self.dim, "query vector dimension mismatch");
			return Ok(hits);
		}
		if limit == 0 || self.count().await? == 0 {
			return Ok(hits);
		}
		let mut stream = self
			.table
			.vector_search(q_vec.to_vec())?
			.column("vector")
			.distance_type(DistanceType::Cosine)
			.select(Select::columns(&["id"]))
			.limit(limit)
			.execute()
			.await?;
		while let Some(batch) = stream.try_next().await? {
			let ids = column::<Int64Array>(&batch, "id")?;
			let distances = column::<Float32Array>(&batch, "_distance")?;
			for i in 0..batch.num_rows() {
				hits.insert(ids.value(i), distances.value(i));
			}
		}
		tracing::debug!(hits = hits.len(), "vector search");
		Ok(hits)
	}

	/// Full rows for `ids`; ids with no row are simply absent from the map.
	pub async fn get_records(&self, ids: &[ChunkId]) -> Result<HashMap<ChunkId, ChunkRecord>> {
		let mut out = HashMap::with_capacity(ids.len());
		if ids.is_empty() { return Ok(out); }
		let mut stream = self
			.table
			.query()
			.only_if(format!("id IN ({})", id_list(ids)))
			.select(Select::columns(&["id", "source_type", "source_id", "content", "metadata", "created_at"]))
			.execute()
			.await?;
		while let Some(batch) = stream.try_next().await? {
			for record in records_from_batch(&batch)? {
				out.insert(record.id, record);
			}
		}
		Ok(out)
	}

	/// Every chunk id, optionally restricted to one document.
	pub async fn ids(&self, source_id: Option<&str>) -> Result<BTreeSet<ChunkId>> {
		let mut query = self.table.query().select(Select::columns(&["id"]));
		if let Some(source_id) = source_id {
			query = query.only_if(format!("source_id = {}", sql_literal(source_id)));
		}
		let mut stream = query.execute().await?;
		let mut ids = BTreeSet::new();
		while let Some(batch) = stream.try_next().await? {
			ids.extend(column::<Int64Array>(&batch, "id")?.values().iter().copied());
		}
		Ok(ids)
	}

	pub async fn max_id(&self) -> Result<Option<ChunkId>> {
		Ok(self.ids(None).await?.last().copied())
	}
}

fn records_from_batch(batch: &RecordBatch) -> Result<Vec<ChunkRecord>> {
	let ids = column::<Int64Array>(batch, "id")?;
	let source_types = column::<StringArray>(batch, "source_type")?;
	let source_ids = column::<StringArray>(batch, "source_id")?;
	let contents = column::<StringArray>(batch, "content")?;
	let metadata = column::<StringArray>(batch, "metadata")?;
	let created = column::<TimestampMillisecondArray>(batch, "created_at")?;
	(0..batch.num_rows())
		.map(|i| {
			let meta: Meta = serde_json::from_str(metadata.value(i))?;
			let created_at = DateTime::<Utc>::from_timestamp_millis(created.value(i))
				.ok_or_else(|| anyhow!("created_at out of range for chunk {}", ids.value(i)))?;
			Ok(ChunkRecord {
				id: ids.value(i),
				source_type: source_types.value(i).to_string(),
				source_id: source_ids.value(i).to_string(),
				content: contents.value(i).to_string(),
				metadata: meta,
				created_at,
			})
		})
		.collect()
}
