//! docrag-embed
//!
//! Sentence embeddings for chunk and query text. `EmbeddingModel` runs a BERT
//! sentence encoder (all-MiniLM-L6-v2, 384 dimensions) through candle;
//! `FakeEmbedder` is a deterministic hashed bag-of-words stand-in used by
//! tests and offline development.

pub mod device;
pub mod pool;
pub mod tokenize;

use anyhow::{anyhow, Context};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use tokenizers::Tokenizer;

use docrag_core::config::{expand_path, EmbeddingSettings};
use docrag_core::traits::Embedder;
use docrag_core::{Error, Result};

pub use device::select_device;
pub use pool::masked_mean_l2;
pub use tokenize::{tokenize_batch, EncodedBatch};

pub const DEFAULT_MODEL_DIR: &str = "models/all-MiniLM-L6-v2";

pub struct EmbeddingModel {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
    batch_size: usize,
    pad_id: u32,
}

impl EmbeddingModel {
    pub fn load(model_dir: &Path, max_len: usize, batch_size: usize) -> anyhow::Result<Self> {
        let device = select_device();
        tracing::info!(model_dir = %model_dir.display(), "loading sentence encoder");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let pad_id = tokenizer.token_to_id("[PAD]").unwrap_or(0);

        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: BertConfig = serde_json::from_str(&raw_config)?;
        let dim = serde_json::from_str::<serde_json::Value>(&raw_config)?
            .get("hidden_size")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| anyhow!("{} has no hidden_size", config_path.display()))? as usize;

        let safetensors = model_dir.join("model.safetensors");
        let vb = if safetensors.exists() {
            // SAFETY: the weights file is memory-mapped read-only and not modified while the model lives.
            unsafe { VarBuilder::from_mmaped_safetensors(&[safetensors], DTYPE, &device)? }
        } else {
            let weights_path = model_dir.join("pytorch_model.bin");
            let weights = candle_core::pickle::read_all(&weights_path)
                .with_context(|| format!("reading {}", weights_path.display()))?;
            let weights_map: HashMap<String, Tensor> = weights.into_iter().collect();
            VarBuilder::from_tensors(weights_map, DTYPE, &device)
        };
        let model = BertModel::load(vb, &config)?;
        tracing::info!(dim, max_len, "sentence encoder ready");
        Ok(Self { model, tokenizer, device, dim, max_len, batch_size: batch_size.max(1), pad_id })
    }

    fn embed_chunk(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let batch = tokenize_batch(&self.tokenizer, texts, self.max_len, self.pad_id, &self.device)?;
        let hidden = self.model.forward(&batch.input_ids, &batch.token_type_ids, Some(&batch.attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &batch.attention_mask)?;
        Ok(pooled.to_device(&Device::Cpu)?.to_vec2::<f32>()?)
    }
}

impl Embedder for EmbeddingModel {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            out.extend(self.embed_chunk(chunk).map_err(Error::embedding)?);
        }
        tracing::debug!(count = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(out)
    }
}

/// Hashed bag-of-words embedder: each lowercased word lands in one bucket.
/// Texts sharing words get positive cosine similarity, unrelated texts ~0.
pub struct FakeEmbedder { dim: usize }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        let words = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase);
        for word in words {
            let mut hasher = XxHash64::with_seed(0);
            word.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            v[idx] += 0.5 + (((h >> 32) as u32) as f32) / (u32::MAX as f32);
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v { *x /= norm; }
        }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Build the embedder described by `settings`.
///
/// `APP_USE_FAKE_EMBEDDINGS=1` (or `embedding.use_fake`) selects
/// `FakeEmbedder`; otherwise the model directory is resolved and loaded, and
/// any failure is reported as `Error::Embedding`.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(settings.use_fake);
    if use_fake {
        tracing::info!(dim = settings.dim, "using FakeEmbedder");
        return Ok(Box::new(FakeEmbedder::new(settings.dim)));
    }
    let model_dir = resolve_model_dir(settings.model_dir.as_deref()).map_err(Error::embedding)?;
    let model = EmbeddingModel::load(&model_dir, settings.max_len, settings.batch_size).map_err(Error::embedding)?;
    if model.dim() != settings.dim {
        tracing::warn!(configured = settings.dim, actual = model.dim(), "embedding.dim differs from the model; using the model's");
    }
    Ok(Box::new(model))
}

fn resolve_model_dir(configured: Option<&str>) -> anyhow::Result<PathBuf> {
    let candidates = configured
        .map(expand_path)
        .into_iter()
        .chain(std::env::var("APP_MODEL_DIR").ok().map(PathBuf::from))
        .chain(std::env::var("MODEL_DIR").ok().map(PathBuf::from))
        .chain([PathBuf::from(DEFAULT_MODEL_DIR), Path::new("..").join(DEFAULT_MODEL_DIR)]);
    for dir in candidates {
        if dir.join("tokenizer.json").exists() {
            tracing::debug!(dir = %dir.display(), "resolved model directory");
            return Ok(dir);
        }
    }
    Err(anyhow!("Could not locate the all-MiniLM-L6-v2 model directory (set embedding.model_dir or APP_MODEL_DIR)"))
}
