use tch::{nn, Tensor};

use crate::init::linear_config;

/// Position-wise feed-forward block: expand to d_ff, ReLU, dropout, project back.
#[derive(Debug)]
pub struct FeedForwardBlock {
    linear_1: nn::Linear,
    linear_2: nn::Linear,
    dropout: f64,
}

impl FeedForwardBlock {
    pub fn new(vs: &nn::Path, d_model: i64, d_ff: i64, dropout: f64) -> Self {
        let linear_1 = nn::linear(vs / "linear_1", d_model, d_ff, linear_config(d_model, d_ff, true));
        let linear_2 = nn::linear(vs / "linear_2", d_ff, d_model, linear_config(d_ff, d_model, true));

        Self {
            linear_1,
            linear_2,
            dropout,
        }
    }

    /// x: [batch, seq_len, d_model] -> [batch, seq_len, d_model]
    pub fn forward(&self, x: &Tensor, train: bool) -> Tensor {
        x.apply(&self.linear_1)
            .relu()
            .dropout(self.dropout, train)
            .apply(&self.linear_2)
    }
}
