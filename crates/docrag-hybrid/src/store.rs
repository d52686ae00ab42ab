//! Dual index store: the keyword index and the chunk table under one root.
//!
//! The chunk table (metadata + embeddings) decides what exists. Every write
//! stages keyword documents, applies the table change, then commits the
//! keyword index; a failure at any step undoes the earlier ones. When the undo
//! itself fails the handle is poisoned and every further call returns
//! `Error::Consistency` until the store is reopened, which reconciles the
//! keyword index against the table.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::runtime::Runtime;

use docrag_core::types::{ChunkId, ChunkRecord, Meta, NewChunk, ScoreTable, StoreStatus};
use docrag_core::{Error, Result};
use docrag_text::KeywordIndex;
use docrag_vector::ChunkTable;

pub const KEYWORD_DIR: &str = "keyword";
pub const CHUNKS_DIR: &str = "chunks";

pub struct DualIndexStore {
    root: PathBuf,
    keyword: KeywordIndex,
    chunks: ChunkTable,
    next_id: ChunkId,
    poisoned: Option<String>,
    // Declared last so it is dropped after the table handle it drives.
    runtime: Runtime,
}

impl DualIndexStore {
    /// Open or create the store at `root` for embeddings of width `dim`.
    ///
    /// Must not be called from inside an async runtime.
    pub fn open(root: &Path, dim: usize) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("docrag-store")
            .enable_all()
            .build()
            .map_err(Error::storage)?;
        let chunks = runtime
            .block_on(ChunkTable::open(&root.join(CHUNKS_DIR), dim))
            .map_err(Error::storage)?;
        let keyword = KeywordIndex::open(&root.join(KEYWORD_DIR)).map_err(Error::storage)?;
        let next_id = runtime.block_on(chunks.max_id()).map_err(Error::storage)?.map_or(1, |max| max + 1);

        let mut store = Self { root: root.to_path_buf(), keyword, chunks, next_id, poisoned: None, runtime };
        store.reconcile()?;
        tracing::info!(root = %root.display(), dim, next_id, "store opened");
        Ok(store)
    }

    /// Release the writer lock and runtime. Equivalent to dropping the handle.
    pub fn close(self) {
        tracing::debug!(root = %self.root.display(), "store closed");
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dim(&self) -> usize {
        self.chunks.dim()
    }

    pub fn save(
        &mut self,
        source_type: &str,
        content: &str,
        embedding: Vec<f32>,
        source_id: &str,
        metadata: Meta,
    ) -> Result<ChunkId> {
        let chunk = NewChunk {
            source_type: source_type.to_string(),
            source_id: source_id.to_string(),
            content: content.to_string(),
            embedding,
            metadata,
        };
        let ids = self.save_batch(vec![chunk])?;
        ids.first().copied().ok_or_else(|| Error::Consistency("save produced no id".into()))
    }

    /// Write all `chunks` as one unit; ids are assigned in order.
    pub fn save_batch(&mut self, chunks: Vec<NewChunk>) -> Result<Vec<ChunkId>> {
        self.write_unit(None, chunks)
    }

    /// Remove every chunk of `source_id` and write `chunks` in the same unit.
    pub fn replace_source(&mut self, source_id: &str, chunks: Vec<NewChunk>) -> Result<Vec<ChunkId>> {
        if chunks.is_empty() {
            self.delete_source(source_id)?;
            return Ok(Vec::new());
        }
        self.write_unit(Some(source_id), chunks)
    }

    /// Remove a document's chunks from both indexes; returns how many were removed.
    pub fn delete_source(&mut self, source_id: &str) -> Result<usize> {
        self.ensure_usable()?;
        let existing = self.block_on(self.chunks.ids(Some(source_id)))?;
        if existing.is_empty() {
            return Ok(0);
        }
        let version = self.block_on(self.chunks.version())?;
        self.keyword.delete_source(source_id);
        if let Err(e) = self.block_on(self.chunks.delete_source(source_id, None)) {
            self.discard_keyword_changes();
            return Err(e);
        }
        if let Err(e) = self.keyword.commit() {
            self.undo(version, &e);
            return Err(Error::storage(e));
        }
        tracing::info!(source_id, removed = existing.len(), "source deleted");
        Ok(existing.len())
    }

    /// Records for `ids`; ids with no row are absent from the map.
    pub fn get_metadata(&self, ids: &[ChunkId]) -> Result<HashMap<ChunkId, ChunkRecord>> {
        self.ensure_usable()?;
        self.block_on(self.chunks.get_records(ids))
    }

    /// Keyword candidates as `id -> -bm25` (lower is better).
    pub fn search_lexical(&self, query: &str, limit: usize) -> Result<ScoreTable> {
        self.ensure_usable()?;
        self.keyword.search(query, limit).map_err(Error::storage)
    }

    /// Vector candidates as `id -> cosine distance` (lower is better).
    pub fn search_vector(&self, query_vector: &[f32], limit: usize) -> Result<ScoreTable> {
        self.ensure_usable()?;
        self.block_on(self.chunks.search_vec(query_vector, limit))
    }

    pub fn status(&self) -> Result<StoreStatus> {
        self.ensure_usable()?;
        let chunk_count = self.block_on(self.chunks.count())?;
        let size_bytes = walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len())
            .sum();
        Ok(StoreStatus { location: self.root.clone(), chunk_count, size_bytes })
    }

    fn write_unit(&mut self, replace: Option<&str>, chunks: Vec<NewChunk>) -> Result<Vec<ChunkId>> {
        self.ensure_usable()?;
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let dim = self.chunks.dim();
        if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != dim) {
            return Err(Error::Embedding(format!(
                "embedding for '{}' has {} dimensions, store expects {dim}",
                bad.source_id,
                bad.embedding.len()
            )));
        }

        let first = self.next_id;
        let ids: Vec<ChunkId> = (first..first + chunks.len() as ChunkId).collect();
        let version = self.block_on(self.chunks.version())?;

        if let Some(source_id) = replace {
            self.keyword.delete_source(source_id);
        }
        for (id, chunk) in ids.iter().zip(&chunks) {
            if let Err(e) = self.keyword.add(*id, &chunk.source_id, &chunk.content) {
                self.discard_keyword_changes();
                return Err(Error::storage(e));
            }
        }

        let table = &self.chunks;
        let table_write = async {
            table.insert(&ids, &chunks, Utc::now()).await?;
            if let Some(source_id) = replace {
                table.delete_source(source_id, Some(first)).await?;
            }
            anyhow::Ok(())
        };
        if let Err(e) = self.runtime.block_on(table_write) {
            self.undo(version, &e);
            return Err(Error::storage(e));
        }

        if let Err(e) = self.keyword.commit() {
            self.undo(version, &e);
            return Err(Error::storage(e));
        }

        self.next_id = first + ids.len() as ChunkId;
        tracing::debug!(count = ids.len(), first_id = first, replaced = replace.is_some(), "chunks written");
        Ok(ids)
    }

    /// Undo a failed unit: drop staged keyword changes and restore the table to `version`.
    fn undo(&mut self, version: u64, cause: &anyhow::Error) {
        tracing::warn!(error = %format!("{cause:#}"), version, "write failed, rolling back");
        self.discard_keyword_changes();
        if let Err(e) = self.runtime.block_on(self.chunks.restore_to(version)) {
            self.poison(format!("chunk table could not be restored to version {version}: {e:#}"));
        }
    }

    fn discard_keyword_changes(&mut self) {
        if let Err(e) = self.keyword.rollback() {
            self.poison(format!("keyword index rollback failed: {e:#}"));
        }
    }

    fn poison(&mut self, reason: String) {
        tracing::error!(root = %self.root.display(), reason = %reason, "store poisoned");
        self.poisoned = Some(reason);
    }

    fn ensure_usable(&self) -> Result<()> {
        match &self.poisoned {
            Some(reason) => Err(Error::Consistency(format!("{reason}; reopen the store to recover"))),
            None => Ok(()),
        }
    }

    /// Make the keyword index hold exactly the ids present in the chunk table.
    fn reconcile(&mut self) -> Result<()> {
        let table_ids = self.block_on(self.chunks.ids(None))?;
        let keyword_ids = self.keyword.all_ids().map_err(Error::storage)?;
        let orphans: Vec<ChunkId> = keyword_ids.difference(&table_ids).copied().collect();
        let missing: Vec<ChunkId> = table_ids.difference(&keyword_ids).copied().collect();
        if orphans.is_empty() && missing.is_empty() {
            return Ok(());
        }
        tracing::warn!(orphans = orphans.len(), missing = missing.len(), "keyword index out of sync, reconciling");

        self.keyword.delete_ids(&orphans);
        let records = self.block_on(self.chunks.get_records(&missing))?;
        for id in &missing {
            let record = records
                .get(id)
                .ok_or_else(|| Error::Consistency(format!("chunk {id} listed but not readable")))?;
            self.keyword.add(record.id, &record.source_id, &record.content).map_err(Error::storage)?;
        }
        self.keyword.commit().map_err(Error::storage)
    }

    fn block_on<T>(&self, fut: impl Future<Output = anyhow::Result<T>>) -> Result<T> {
        self.runtime.block_on(fut).map_err(Error::storage)
    }
}
