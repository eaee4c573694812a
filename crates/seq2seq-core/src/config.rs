use std::fs;
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Size of the source vocabulary.
    pub src_vocab_size: i64,
    /// Size of the target vocabulary (also the width of the output projection).
    pub tgt_vocab_size: i64,
    /// Maximum source sequence length covered by the positional table.
    pub src_seq_len: i64,
    /// Maximum target sequence length covered by the positional table.
    pub tgt_seq_len: i64,
    /// Width of token embeddings and of every hidden state.
    #[serde(default = "default_d_model")]
    pub d_model: i64,
    /// Number of encoder blocks, and of decoder blocks.
    #[serde(default = "default_n_layers")]
    pub n_layers: i64,
    /// Number of attention heads.
    #[serde(default = "default_n_heads")]
    pub n_heads: i64,
    /// Dropout probability (embeddings, attention weights, residuals, feed-forward).
    #[serde(default = "default_dropout")]
    pub dropout: f64,
    /// Hidden width of the position-wise feed-forward block.
    #[serde(default = "default_d_ff")]
    pub d_ff: i64,
    /// Added to the standard deviation in every layer norm.
    #[serde(default = "default_layer_norm_eps")]
    pub layer_norm_eps: f64,
}

fn default_d_model() -> i64 {
    512
}

fn default_n_layers() -> i64 {
    6
}

fn default_n_heads() -> i64 {
    8
}

fn default_dropout() -> f64 {
    0.1
}

fn default_d_ff() -> i64 {
    2048
}

fn default_layer_norm_eps() -> f64 {
    1e-6
}

impl ModelConfig {
    /// Base-sized model ("Attention Is All You Need") over the given vocabularies.
    pub fn new(src_vocab_size: i64, tgt_vocab_size: i64, src_seq_len: i64, tgt_seq_len: i64) -> Self {
        Self {
            src_vocab_size,
            tgt_vocab_size,
            src_seq_len,
            tgt_seq_len,
            d_model: default_d_model(),
            n_layers: default_n_layers(),
            n_heads: default_n_heads(),
            dropout: default_dropout(),
            d_ff: default_d_ff(),
            layer_norm_eps: default_layer_norm_eps(),
        }
    }

    pub fn head_size(&self) -> i64 {
        self.d_model / self.n_heads
    }

    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("src_vocab_size", self.src_vocab_size),
            ("tgt_vocab_size", self.tgt_vocab_size),
            ("src_seq_len", self.src_seq_len),
            ("tgt_seq_len", self.tgt_seq_len),
            ("d_model", self.d_model),
            ("n_layers", self.n_layers),
            ("n_heads", self.n_heads),
            ("d_ff", self.d_ff),
        ];
        for (name, value) in sizes {
            if value <= 0 {
                return Err(ModelError::InvalidConfig(format!("{} must be positive, got {}", name, value)));
            }
        }

        if self.d_model % self.n_heads != 0 {
            return Err(ModelError::HeadsMismatch {
                d_model: self.d_model,
                n_heads: self.n_heads,
            });
        }

        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ModelError::InvalidConfig(format!("dropout must be in [0, 1), got {}", self.dropout)));
        }

        // A single feature has no unbiased std.
        if self.d_model < 2 {
            return Err(ModelError::InvalidConfig(format!("d_model must be at least 2, got {}", self.d_model)));
        }

        if !(self.layer_norm_eps > 0.0 && self.layer_norm_eps.is_finite()) {
            return Err(ModelError::InvalidConfig(format!(
                "layer_norm_eps must be positive and finite, got {}",
                self.layer_norm_eps
            )));
        }

        if self.d_model % 2 != 0 {
            warn!("odd d_model ({}): last positional column is sine-only", self.d_model);
        }

        Ok(())
    }

    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a config, choosing YAML for `.yaml`/`.yml` files and JSON otherwise.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }
}
