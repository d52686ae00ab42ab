//! docrag-text
//!
//! Tantivy keyword index for chunk content. `KeywordIndex` stages and commits
//! documents keyed by chunk id; `KeywordIndex::search` returns BM25 scores in
//! rank form (negated, lower is better).
pub mod tantivy_utils;
pub mod index;
pub mod search;

pub use index::KeywordIndex;
