//! docrag-vector
//!
//! LanceDB chunk table: metadata columns and embeddings in one row per chunk,
//! cosine k-NN search, and lookups by id or document. All operations are async;
//! callers outside a runtime drive them with `block_on`.
pub mod columns;
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use table::ChunkTable;
