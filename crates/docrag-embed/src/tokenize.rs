use anyhow::{anyhow, Result};
use candle_core::{DType, Device, Tensor};
use tokenizers::Tokenizer;

/// Model inputs for one batch, each shaped `[B, T]` where `T` is the longest
/// (truncated) sequence in the batch.
pub struct EncodedBatch {
    pub input_ids: Tensor,
    pub attention_mask: Tensor,
    pub token_type_ids: Tensor,
}

pub fn tokenize_batch(
    tokenizer: &Tokenizer,
    texts: &[String],
    max_len: usize,
    pad_id: u32,
    device: &Device,
) -> Result<EncodedBatch> {
    let mut rows = Vec::with_capacity(texts.len());
    for text in texts {
        let enc = tokenizer.encode(text.as_str(), true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let mut ids = enc.get_ids().to_vec();
        let mut mask = enc.get_attention_mask().to_vec();
        if ids.len() > max_len { ids.truncate(max_len); mask.truncate(max_len); }
        rows.push((ids, mask));
    }
    let seq_len = rows.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0).max(1);

    let mut flat_ids = Vec::with_capacity(rows.len() * seq_len);
    let mut flat_mask = Vec::with_capacity(rows.len() * seq_len);
    for (mut ids, mut mask) in rows {
        let pad = seq_len - ids.len();
        ids.extend(std::iter::repeat(pad_id).take(pad));
        mask.extend(std::iter::repeat(0).take(pad));
        flat_ids.extend(ids);
        flat_mask.extend(mask);
    }

    let shape = (texts.len(), seq_len);
    let input_ids = Tensor::from_vec(flat_ids, shape, device)?;
    let attention_mask = Tensor::from_vec(flat_mask, shape, device)?;
    let token_type_ids = Tensor::zeros(shape, DType::U32, device)?;
    Ok(EncodedBatch { input_ids, attention_mask, token_type_ids })
}
