use tch::{nn, Tensor};

use crate::error::{ModelError, Result};
use crate::init::linear_config;

/// Score written where the mask is zero, before the softmax.
const MASKED_SCORE: f64 = -1e9;

/// Multi-head scaled dot-product attention with separate, bias-free Q/K/V/O projections.
///
/// Used as encoder self-attention, decoder masked self-attention and decoder
/// cross-attention; the three only differ in what is passed as q/k/v and mask.
#[derive(Debug)]
pub struct MultiHeadAttentionBlock {
    w_q: nn::Linear,
    w_k: nn::Linear,
    w_v: nn::Linear,
    w_o: nn::Linear,
    d_model: i64,
    n_head: i64,
    d_k: i64,
    dropout: f64,
}

impl MultiHeadAttentionBlock {
    pub fn new(vs: &nn::Path, d_model: i64, n_head: i64, dropout: f64) -> Result<Self> {
        if n_head <= 0 || d_model % n_head != 0 {
            return Err(ModelError::HeadsMismatch { d_model, n_heads: n_head });
        }

        let config = linear_config(d_model, d_model, false);
        let w_q = nn::linear(vs / "w_q", d_model, d_model, config);
        let w_k = nn::linear(vs / "w_k", d_model, d_model, config);
        let w_v = nn::linear(vs / "w_v", d_model, d_model, config);
        let w_o = nn::linear(vs / "w_o", d_model, d_model, config);

        Ok(Self {
            w_q,
            w_k,
            w_v,
            w_o,
            d_model,
            n_head,
            d_k: d_model / n_head,
            dropout,
        })
    }

    /// q: [batch, q_len, d_model], k/v: [batch, kv_len, d_model]
    /// mask: broadcastable to [batch, n_head, q_len, kv_len], zero = blocked
    pub fn forward(&self, q: &Tensor, k: &Tensor, v: &Tensor, mask: Option<&Tensor>, train: bool) -> Result<Tensor> {
        self.forward_with_scores(q, k, v, mask, train).map(|(out, _)| out)
    }

    /// Same as `forward`, also returning the attention weights [batch, n_head, q_len, kv_len].
    pub fn forward_with_scores(
        &self,
        q: &Tensor,
        k: &Tensor,
        v: &Tensor,
        mask: Option<&Tensor>,
        train: bool,
    ) -> Result<(Tensor, Tensor)> {
        let (b, q_len, _) = q.size3()?;
        let (_, kv_len, _) = k.size3()?;

        let query = self.split_heads(&q.apply(&self.w_q), b, q_len)?;
        let key = self.split_heads(&k.apply(&self.w_k), b, kv_len)?;
        let value = self.split_heads(&v.apply(&self.w_v), b, kv_len)?;

        let mut att = query.matmul(&key.transpose(-2, -1)) * (1.0 / (self.d_k as f64).sqrt());
        if let Some(mask) = mask {
            att = att.masked_fill(&mask.eq(0i64), MASKED_SCORE);
        }
        let att = att.softmax(-1, query.kind());

        let y = att.dropout(self.dropout, train).matmul(&value);
        let y = y.transpose(1, 2).contiguous().f_view([b, q_len, self.d_model])?;

        Ok((y.apply(&self.w_o), att))
    }

    pub fn n_head(&self) -> i64 {
        self.n_head
    }

    /// [batch, len, d_model] -> [batch, n_head, len, d_k]
    fn split_heads(&self, x: &Tensor, b: i64, len: i64) -> Result<Tensor> {
        Ok(x.f_view([b, len, self.n_head, self.d_k])?.transpose(1, 2))
    }
}
