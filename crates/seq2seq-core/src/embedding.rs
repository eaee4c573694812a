use tch::{nn, Tensor};

use crate::init::xavier_uniform;

/// Token embedding scaled by sqrt(d_model).
#[derive(Debug)]
pub struct InputEmbeddings {
    embedding: nn::Embedding,
    scale: f64,
}

impl InputEmbeddings {
    pub fn new(vs: &nn::Path, d_model: i64, vocab_size: i64) -> Self {
        let embedding_config = nn::EmbeddingConfig {
            ws_init: xavier_uniform(d_model, vocab_size),
            ..Default::default()
        };
        let embedding = nn::embedding(vs / "embedding", vocab_size, d_model, embedding_config);

        Self {
            embedding,
            scale: (d_model as f64).sqrt(),
        }
    }

    /// idx: [batch, seq_len] (int64) -> [batch, seq_len, d_model]
    pub fn forward(&self, idx: &Tensor) -> Tensor {
        idx.apply(&self.embedding) * self.scale
    }
}
