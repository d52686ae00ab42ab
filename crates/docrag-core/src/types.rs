//! Domain types shared by the keyword index, the vector table and the fusion
//! layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

pub type ChunkId = i64;
pub type Meta = BTreeMap<String, String>;

pub const DEFAULT_SOURCE_TYPE: &str = "document_page";

/// A piece of a document produced by the chunker, not yet embedded or stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDraft {
    pub content: String,
    pub metadata: Meta,
}

impl ChunkDraft {
    pub fn section_title(&self) -> Option<&str> {
        self.metadata.get("section_title").map(String::as_str)
    }
}

/// A chunk ready to be written: content plus its embedding.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub source_type: String,
    pub source_id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: Meta,
}

/// A persisted chunk as read back from the metadata table.
///
/// - `id`: join key between the keyword index and the vector table
/// - `source_id`: originating document; shared by all chunks of a document
/// - `content`: chunk text including the `[From: ..]` back-reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: ChunkId,
    pub source_type: String,
    pub source_id: String,
    pub content: String,
    pub metadata: Meta,
    pub created_at: DateTime<Utc>,
}

/// Indicates which engine produced a score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Vector,
    Text,
}

/// Insertion-ordered mapping from chunk id to a raw engine score.
///
/// Each engine fills one table; the fusion layer reads two of them and their
/// union. Re-inserting an id overwrites its score but keeps its position.
#[derive(Debug, Clone)]
pub struct ScoreTable {
    kind: SourceKind,
    entries: Vec<(ChunkId, f32)>,
    positions: HashMap<ChunkId, usize>,
}

impl ScoreTable {
    pub fn new(kind: SourceKind) -> Self {
        Self { kind, entries: Vec::new(), positions: HashMap::new() }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn insert(&mut self, id: ChunkId, score: f32) {
        match self.positions.get(&id) {
            Some(&pos) => self.entries[pos].1 = score,
            None => {
                self.positions.insert(id, self.entries.len());
                self.entries.push((id, score));
            }
        }
    }

    pub fn get(&self, id: ChunkId) -> Option<f32> {
        self.positions.get(&id).map(|&pos| self.entries[pos].1)
    }

    pub fn contains(&self, id: ChunkId) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChunkId, f32)> + '_ {
        self.entries.iter().copied()
    }

    pub fn ids(&self) -> impl Iterator<Item = ChunkId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    /// `(min, max)` over all scores, `None` when empty.
    pub fn bounds(&self) -> Option<(f32, f32)> {
        self.entries.iter().fold(None, |acc, &(_, s)| match acc {
            None => Some((s, s)),
            Some((lo, hi)) => Some((lo.min(s), hi.max(s))),
        })
    }
}

impl Extend<(ChunkId, f32)> for ScoreTable {
    fn extend<I: IntoIterator<Item = (ChunkId, f32)>>(&mut self, iter: I) {
        for (id, score) in iter {
            self.insert(id, score);
        }
    }
}

/// One fused, ranked retrieval hit. The three scores are normalized to [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: ChunkId,
    pub content: String,
    pub source_type: String,
    pub source_id: String,
    pub metadata: Meta,
    pub lexical_score: f32,
    pub vector_score: f32,
    pub combined_score: f32,
}

/// Operational snapshot of a store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStatus {
    pub location: PathBuf,
    pub chunk_count: usize,
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_table_keeps_first_insert_position() {
        let mut t = ScoreTable::new(SourceKind::Text);
        t.insert(7, -1.0);
        t.insert(3, -2.0);
        t.insert(7, -5.0);
        assert_eq!(t.ids().collect::<Vec<_>>(), vec![7, 3]);
        assert_eq!(t.get(7), Some(-5.0));
        assert_eq!(t.bounds(), Some((-5.0, -2.0)));
    }

    #[test]
    fn empty_table_has_no_bounds() {
        let t = ScoreTable::new(SourceKind::Vector);
        assert!(t.is_empty());
        assert!(t.bounds().is_none());
    }
}
