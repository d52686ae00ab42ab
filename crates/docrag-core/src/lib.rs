//! docrag-core
//!
//! Shared vocabulary for the retrieval engine: chunk and score types, the
//! error taxonomy, configuration, the header-aware chunker and the
//! `Embedder`/`DocumentSource` seams.

pub mod chunker;
pub mod config;
pub mod error;
pub mod source;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
