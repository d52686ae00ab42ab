use anyhow::Result;
use tantivy::collector::TopDocs;
use tantivy::query::{Query, QueryParser};
use tantivy::schema::Value;
use tantivy::TantivyDocument;

use docrag_core::types::{ScoreTable, SourceKind};
use docrag_core::Error;

use crate::index::KeywordIndex;

impl KeywordIndex {
	/// Parse user text into a conjunctive query over chunk content.
	pub fn parse_query(&self, query_text: &str) -> docrag_core::Result<Box<dyn Query>> {
		let mut query_parser = QueryParser::for_index(&self.index, vec![self.fields.content]);
		query_parser.set_conjunction_by_default();
		query_parser.parse_query(query_text).map_err(|e| Error::IndexQuery(e.to_string()))
	}

	/// Top `limit` chunks for `query_text` as `id -> -bm25`, best (most negative) first.
	///
	/// Blank, malformed, or unmatched queries give an empty table.
	pub fn search(&self, query_text: &str, limit: usize) -> Result<ScoreTable> {
		let mut table = ScoreTable::new(SourceKind::Text);
		if query_text.trim().is_empty() || limit == 0 {
			return Ok(table);
		}
		let query = match self.parse_query(query_text) {
			Ok(q) => q,
			Err(e) => {
				tracing::debug!(query = query_text, error = %e, "keyword query rejected");
				return Ok(table);
			}
		};
		let searcher = self.reader.searcher();
		let top_docs = searcher.search(&query, &TopDocs::with_limit(limit))?;
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			if let Some(id) = doc.get_first(self.fields.id).and_then(|v| v.as_i64()) {
				table.insert(id, -score);
			}
		}
		tracing::debug!(query = query_text, hits = table.len(), "keyword search");
		Ok(table)
	}
}
