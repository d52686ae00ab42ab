//! docrag-hybrid
//!
//! Hybrid retrieval over a dual keyword/vector store: the store itself,
//! weighted score fusion, prompt context formatting, the `RetrievalEngine`
//! facade and a polling `SourceWatcher`.

pub mod context;
pub mod engine;
pub mod fusion;
pub mod store;
pub mod watcher;

pub use context::{format_context, NO_CONTEXT};
pub use engine::{RetrievalEngine, RetrieveOptions};
pub use fusion::{fuse, rank, FusionWeights};
pub use store::DualIndexStore;
pub use watcher::SourceWatcher;
