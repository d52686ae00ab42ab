use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::Path;
use tantivy::collector::DocSetCollector;
use tantivy::directory::MmapDirectory;
use tantivy::query::AllQuery;
use tantivy::schema::Value;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

use docrag_core::types::ChunkId;

use crate::tantivy_utils::{build_schema, register_tokenizer, ChunkFields};

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// On-disk BM25 index over chunk content.
///
/// Writes are staged in the writer and become visible only after `commit`;
/// `rollback` discards everything staged since the last commit. The writer
/// holds the directory lock for the lifetime of the value.
pub struct KeywordIndex {
	pub(crate) index: Index,
	pub(crate) reader: IndexReader,
	writer: IndexWriter,
	pub(crate) fields: ChunkFields,
}

impl KeywordIndex {
	pub fn open(dir: &Path) -> Result<Self> {
		std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
		let directory = MmapDirectory::open(dir)?;
		let index = Index::open_or_create(directory, build_schema())
			.with_context(|| format!("opening keyword index at {}", dir.display()))?;
		register_tokenizer(&index);
		let fields = ChunkFields::from_schema(&index.schema())?;
		// One indexing thread keeps the heap budget above tantivy's per-thread minimum.
		let writer = index
			.writer_with_num_threads(1, WRITER_HEAP_BYTES)
			.context("acquiring keyword index writer (is another process using this store?)")?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		tracing::debug!(dir = %dir.display(), "keyword index opened");
		Ok(Self { index, reader, writer, fields })
	}

	/// Stage one chunk; invisible to searches until `commit`.
	pub fn add(&self, id: ChunkId, source_id: &str, content: &str) -> Result<()> {
		self.writer.add_document(doc!(
			self.fields.id => id,
			self.fields.source_id => source_id.to_string(),
			self.fields.content => content.to_string(),
		))?;
		Ok(())
	}

	pub fn delete_ids(&self, ids: &[ChunkId]) {
		for &id in ids {
			self.writer.delete_term(Term::from_field_i64(self.fields.id, id));
		}
	}

	pub fn delete_source(&self, source_id: &str) {
		self.writer.delete_term(Term::from_field_text(self.fields.source_id, source_id));
	}

	pub fn commit(&mut self) -> Result<()> {
		self.writer.commit().context("committing keyword index")?;
		self.reader.reload()?;
		Ok(())
	}

	pub fn rollback(&mut self) -> Result<()> {
		self.writer.rollback().context("rolling back keyword index")?;
		Ok(())
	}

	pub fn num_docs(&self) -> u64 {
		self.reader.searcher().num_docs()
	}

	/// Ids of every committed document.
	pub fn all_ids(&self) -> Result<BTreeSet<ChunkId>> {
		let searcher = self.reader.searcher();
		let addrs = searcher.search(&AllQuery, &DocSetCollector)?;
		let mut ids = BTreeSet::new();
		for addr in addrs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			if let Some(id) = doc.get_first(self.fields.id).and_then(|v| v.as_i64()) {
				ids.insert(id);
			}
		}
		Ok(ids)
	}
}
