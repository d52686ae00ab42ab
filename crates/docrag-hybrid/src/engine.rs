use std::time::Instant;

use docrag_core::chunker;
use docrag_core::config::{IngestSettings, ReingestPolicy, RetrievalSettings, Settings};
use docrag_core::source::DirectorySource;
use docrag_core::traits::{DocumentSource, Embedder};
use docrag_core::types::{NewChunk, SearchResult, StoreStatus};
use docrag_core::{Error, Result};

use crate::context::{format_context, NO_CONTEXT};
use crate::fusion::{rank, FusionWeights};
use crate::store::DualIndexStore;

/// Per-query knobs; defaults come from `[retrieval]` settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrieveOptions {
    pub top_k: usize,
    pub keyword_weight: f32,
    pub vector_weight: f32,
    pub candidate_limit: usize,
    pub max_context_chars: usize,
}

impl From<&RetrievalSettings> for RetrieveOptions {
    fn from(s: &RetrievalSettings) -> Self {
        Self {
            top_k: s.top_k,
            keyword_weight: s.keyword_weight,
            vector_weight: s.vector_weight,
            candidate_limit: s.candidate_limit,
            max_context_chars: s.max_context_chars,
        }
    }
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self::from(&RetrievalSettings::default())
    }
}

/// Ingestion and hybrid retrieval over one store.
pub struct RetrievalEngine {
    store: DualIndexStore,
    embedder: Box<dyn Embedder>,
    source: Box<dyn DocumentSource>,
    ingest: IngestSettings,
    retrieval: RetrievalSettings,
}

impl RetrievalEngine {
    pub fn new(
        store: DualIndexStore,
        embedder: Box<dyn Embedder>,
        source: Box<dyn DocumentSource>,
        settings: &Settings,
    ) -> Self {
        Self {
            store,
            embedder,
            source,
            ingest: settings.ingest.clone(),
            retrieval: settings.retrieval.clone(),
        }
    }

    /// Embedder, store and `DirectorySource` as configured.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let embedder = docrag_embed::get_default_embedder(&settings.embedding)?;
        let store = DualIndexStore::open(&settings.store_dir(), embedder.dim())?;
        let source = DirectorySource::new(settings.documents_dir());
        Ok(Self::new(store, embedder, Box::new(source), settings))
    }

    pub fn store(&self) -> &DualIndexStore {
        &self.store
    }

    pub fn source(&self) -> &dyn DocumentSource {
        self.source.as_ref()
    }

    /// Fetch, chunk, embed and store one document.
    ///
    /// A fetch failure is logged and counts as zero chunks.
    pub fn ingest_document(&mut self, source_id: &str) -> Result<usize> {
        let text = match self.source.get_page_as_text(source_id) {
            Ok(text) => text,
            Err(e @ Error::Fetch { .. }) => {
                tracing::warn!(source_id, error = %e, "skipping document");
                return Ok(0);
            }
            Err(e) => return Err(e),
        };
        self.embed_document(&text, source_id)
    }

    /// Ingest each document in turn. Fetch failures are skipped; any other
    /// error stops the batch, leaving earlier documents stored.
    pub fn ingest_documents<S: AsRef<str>>(&mut self, source_ids: &[S]) -> Result<usize> {
        let mut total = 0;
        for source_id in source_ids {
            total += self.ingest_document(source_id.as_ref())?;
        }
        tracing::info!(documents = source_ids.len(), chunks = total, "batch ingested");
        Ok(total)
    }

    /// Chunk `document_text`, embed every chunk in one batch, and write them
    /// as one unit. Returns 0 for blank input.
    pub fn embed_document(&mut self, document_text: &str, source_id: &str) -> Result<usize> {
        if document_text.trim().is_empty() {
            tracing::debug!(source_id, "empty document, nothing to embed");
            return Ok(0);
        }
        let start = Instant::now();
        let drafts = chunker::chunk(document_text, source_id);
        let texts: Vec<String> = drafts.iter().map(|d| d.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts)?;
        if embeddings.len() != drafts.len() {
            return Err(Error::Embedding(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                drafts.len()
            )));
        }

        let chunks: Vec<NewChunk> = drafts
            .into_iter()
            .zip(embeddings)
            .map(|(draft, embedding)| NewChunk {
                source_type: self.ingest.source_type.clone(),
                source_id: source_id.to_string(),
                content: draft.content,
                embedding,
                metadata: draft.metadata,
            })
            .collect();
        let ids = match self.ingest.reingest {
            ReingestPolicy::Replace => self.store.replace_source(source_id, chunks)?,
            ReingestPolicy::Append => self.store.save_batch(chunks)?,
        };
        tracing::info!(
            source_id,
            chunks = ids.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "document embedded"
        );
        Ok(ids.len())
    }

    /// Top `top_k` chunks for `query` with the configured weights, plus the
    /// formatted context.
    pub fn retrieve(&self, query: &str, top_k: usize) -> Result<(String, Vec<SearchResult>)> {
        let options = RetrieveOptions { top_k, ..RetrieveOptions::from(&self.retrieval) };
        self.retrieve_with(query, &options)
    }

    pub fn retrieve_with(&self, query: &str, options: &RetrieveOptions) -> Result<(String, Vec<SearchResult>)> {
        if query.trim().is_empty() || options.top_k == 0 {
            return Ok((NO_CONTEXT.to_string(), Vec::new()));
        }
        let query_vector = self.embedder.embed(query)?;
        let weights = FusionWeights { keyword: options.keyword_weight, vector: options.vector_weight };
        let window = options.candidate_limit.max(options.top_k);
        let results = rank(&self.store, query, &query_vector, weights, window, options.top_k)?;
        tracing::debug!(query, results = results.len(), "retrieved");
        Ok((format_context(&results, options.max_context_chars), results))
    }

    pub fn delete_source(&mut self, source_id: &str) -> Result<usize> {
        self.store.delete_source(source_id)
    }

    pub fn status(&self) -> Result<StoreStatus> {
        self.store.status()
    }
}
