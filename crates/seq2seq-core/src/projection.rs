use tch::{nn, Tensor};

use crate::init::linear_config;

/// Final linear layer onto the target vocabulary, returning log-probabilities.
#[derive(Debug)]
pub struct ProjectionLayer {
    proj: nn::Linear,
}

impl ProjectionLayer {
    pub fn new(vs: &nn::Path, d_model: i64, vocab_size: i64) -> Self {
        let proj = nn::linear(vs / "proj", d_model, vocab_size, linear_config(d_model, vocab_size, true));
        Self { proj }
    }

    /// x: [batch, seq_len, d_model] -> [batch, seq_len, vocab_size]
    pub fn forward(&self, x: &Tensor) -> Tensor {
        let logits = x.apply(&self.proj);
        logits.log_softmax(-1, logits.kind())
    }
}
