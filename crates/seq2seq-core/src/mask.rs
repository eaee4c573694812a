//! Attention masks in the layout the attention block expects: nonzero = may attend.

use tch::{Device, Kind, Tensor};

use crate::error::Result;

/// tokens: [batch, len] -> [batch, 1, 1, len], 1 where the token is not `pad_id`.
pub fn padding_mask(tokens: &Tensor, pad_id: i64) -> Tensor {
    tokens.ne(pad_id).unsqueeze(1).unsqueeze(1).to_kind(Kind::Int64)
}

/// [1, size, size] lower-triangular ones: position t sees positions <= t.
pub fn causal_mask(size: i64, device: Device) -> Tensor {
    Tensor::ones([1, size, size], (Kind::Int64, device)).tril(0)
}

/// Padding and causal masks combined for decoder self-attention: [batch, 1, len, len].
pub fn decoder_mask(tokens: &Tensor, pad_id: i64) -> Result<Tensor> {
    let (_, len) = tokens.size2()?;
    Ok(padding_mask(tokens, pad_id) * causal_mask(len, tokens.device()).unsqueeze(0))
}
