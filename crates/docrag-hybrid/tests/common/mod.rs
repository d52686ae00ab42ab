#![allow(dead_code)]

use std::path::Path;

use docrag_core::config::{ReingestPolicy, Settings};
use docrag_core::source::DirectorySource;
use docrag_core::traits::Embedder;
use docrag_core::{Error, Result};
use docrag_embed::FakeEmbedder;
use docrag_hybrid::{DualIndexStore, RetrievalEngine};

pub const DIM: usize = 384;

pub const LINDA: &str = "# Linda\n## Skills\nReact, Node.js\n## Availability\nOpen for freelance work";

pub fn open_store(root: &Path) -> DualIndexStore {
    DualIndexStore::open(&root.join("store"), DIM).expect("open store")
}

/// An embedder whose model never loads.
pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn dim(&self) -> usize {
        DIM
    }

    fn max_len(&self) -> usize {
        256
    }

    fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::Embedding("model weights missing".into()))
    }
}

pub fn engine_with_embedder(root: &Path, reingest: ReingestPolicy, embedder: Box<dyn Embedder>) -> RetrievalEngine {
    let mut settings = Settings::default();
    settings.ingest.reingest = reingest;
    let docs = root.join("docs");
    std::fs::create_dir_all(&docs).expect("docs dir");
    RetrievalEngine::new(open_store(root), embedder, Box::new(DirectorySource::new(docs)), &settings)
}

pub fn engine_with(root: &Path, reingest: ReingestPolicy) -> RetrievalEngine {
    engine_with_embedder(root, reingest, Box::new(FakeEmbedder::new(DIM)))
}

pub fn engine(root: &Path) -> RetrievalEngine {
    engine_with(root, ReingestPolicy::Replace)
}

pub fn write_doc(root: &Path, name: &str, text: &str) {
    std::fs::write(root.join("docs").join(name), text).expect("write doc");
}
