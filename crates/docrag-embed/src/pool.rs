use anyhow::Result;
use candle_core::{DType, Tensor};

/// Mean of the token states selected by `attention_mask`, L2-normalized.
///
/// `hidden` is `[B, T, H]`, `attention_mask` is `[B, T]` (any numeric dtype);
/// the result is `[B, H]`.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let (batch, _seq, hidden_dim) = hidden.dims3()?;

    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let summed = hidden.broadcast_mul(&mask.unsqueeze(2)?)?.sum(1)?;
    let counts = mask.sum_keepdim(1)?;
    let mean = summed.broadcast_div(&counts.maximum(1f64)?)?;

    let eps = match hidden.dtype() { DType::F16 | DType::BF16 => 1e-6, _ => 1e-12 };
    let norm = mean.sqr()?.sum_keepdim(1)?.sqrt()?.affine(1.0, eps)?;
    let pooled = mean.broadcast_div(&norm)?;
    anyhow::ensure!(pooled.dims() == &[batch, hidden_dim], "pooled shape {:?}", pooled.dims());
    Ok(pooled)
}
