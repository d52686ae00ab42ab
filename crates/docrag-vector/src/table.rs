//! LanceDB connection and table housekeeping.
use anyhow::{bail, Context, Result};
use arrow_array::RecordBatchIterator;
use lancedb::{connect, Connection, Table};
use std::path::Path;
use std::sync::Arc;

use crate::schema::{build_chunk_schema, vector_dim, CHUNK_TABLE};

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<()> {
    let names = conn.table_names().execute().await?;
    if names.contains(&name.to_string()) {
        return Ok(());
    }
    // create empty table with 0 rows
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name, Box::new(iter)).execute().await?;
    Ok(())
}

/// The `chunks` table: chunk metadata and embeddings, one row per chunk id.
pub struct ChunkTable {
    pub(crate) table: Table,
    pub(crate) dim: usize,
}

impl ChunkTable {
    /// Open (creating if needed) the chunk table under `dir`. An existing
    /// table keeps the dimension it was created with; a different `dim` is an error.
    pub async fn open(dir: &Path, dim: usize) -> Result<Self> {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        let conn = open_db(dir.to_string_lossy().as_ref()).await?;
        ensure_table(&conn, CHUNK_TABLE, build_chunk_schema(dim as i32)).await?;
        let table = conn.open_table(CHUNK_TABLE).execute().await?;
        let existing = vector_dim(&*table.schema().await?);
        if existing != Some(dim as i32) {
            bail!("chunk table at {} has embedding dimension {:?}, expected {}", dir.display(), existing, dim);
        }
        tracing::debug!(dir = %dir.display(), dim, "chunk table opened");
        Ok(Self { table, dim })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub async fn count(&self) -> Result<usize> {
        Ok(self.table.count_rows(None).await?)
    }

    pub async fn version(&self) -> Result<u64> {
        Ok(self.table.version().await?)
    }

    /// Make `version` the latest table version again, undoing later writes.
    pub async fn restore_to(&self, version: u64) -> Result<()> {
        self.table.checkout(version).await?;
        if let Err(e) = self.table.restore().await {
            self.table.checkout_latest().await?;
            return Err(e.into());
        }
        Ok(())
    }
}
