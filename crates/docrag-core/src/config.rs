//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` +
//! `config.<env>.toml` + `APP_*` env vars (`__` separates nested keys, e.g.
//! `APP_RETRIEVAL__TOP_K=5`). Provides helpers to expand `~` and `${VAR}` and
//! to resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::DEFAULT_SOURCE_TYPE;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    /// Wrap an already assembled figment (tests, embedding applications).
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    /// Typed, validated settings.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub embedding: EmbeddingSettings,
    pub retrieval: RetrievalSettings,
    pub ingest: IngestSettings,
    pub watch: WatchSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub dir: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { dir: "data/retrieval_store".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Directory holding `config.json`, `tokenizer.json`, `model.safetensors`.
    pub model_dir: Option<String>,
    pub dim: usize,
    pub max_len: usize,
    pub batch_size: usize,
    pub use_fake: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model_dir: None, dim: 384, max_len: 256, batch_size: 32, use_fake: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub keyword_weight: f32,
    pub vector_weight: f32,
    /// Candidates pulled from each engine before fusion.
    pub candidate_limit: usize,
    pub top_k: usize,
    pub max_context_chars: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            keyword_weight: 0.5,
            vector_weight: 0.5,
            candidate_limit: 100,
            top_k: 10,
            max_context_chars: 4000,
        }
    }
}

/// What happens to a document's existing chunks when it is ingested again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReingestPolicy {
    /// Old chunks are removed in the same unit as the new ones are written.
    #[default]
    Replace,
    /// Every ingestion appends; nothing is deduplicated.
    Append,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub source_type: String,
    pub reingest: ReingestPolicy,
    pub documents_dir: String,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            source_type: DEFAULT_SOURCE_TYPE.to_string(),
            reingest: ReingestPolicy::Replace,
            documents_dir: "data/documents".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    pub poll_interval_secs: u64,
    pub sources: Vec<String>,
    pub state_file: Option<String>,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self { poll_interval_secs: 60, sources: Vec::new(), state_file: None }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        for (name, w) in [("keyword_weight", r.keyword_weight), ("vector_weight", r.vector_weight)] {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::InvalidConfig(format!("retrieval.{name} must be a finite non-negative number, got {w}")));
            }
        }
        if r.candidate_limit == 0 {
            return Err(Error::InvalidConfig("retrieval.candidate_limit must be at least 1".into()));
        }
        if r.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k must be at least 1".into()));
        }
        if self.embedding.dim == 0 {
            return Err(Error::InvalidConfig("embedding.dim must be at least 1".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be at least 1".into()));
        }
        if self.watch.poll_interval_secs == 0 {
            return Err(Error::InvalidConfig("watch.poll_interval_secs must be at least 1".into()));
        }
        Ok(())
    }

    pub fn store_dir(&self) -> PathBuf {
        expand_path(&self.store.dir)
    }

    pub fn documents_dir(&self) -> PathBuf {
        expand_path(&self.ingest.documents_dir)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
