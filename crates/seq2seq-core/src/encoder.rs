use tch::{nn, Tensor};

use crate::attention::MultiHeadAttentionBlock;
use crate::config::ModelConfig;
use crate::error::Result;
use crate::feed_forward::FeedForwardBlock;
use crate::layer_norm::LayerNormalization;
use crate::residual::ResidualConnection;

/// Encoder block: self-attention then feed-forward, each in a pre-norm residual.
#[derive(Debug)]
pub struct EncoderBlock {
    self_attention: MultiHeadAttentionBlock,
    feed_forward: FeedForwardBlock,
    residual: [ResidualConnection; 2],
}

impl EncoderBlock {
    pub fn new(vs: &nn::Path, config: &ModelConfig) -> Result<Self> {
        let self_attention =
            MultiHeadAttentionBlock::new(&(vs / "self_attention"), config.d_model, config.n_heads, config.dropout)?;
        let feed_forward = FeedForwardBlock::new(&(vs / "feed_forward"), config.d_model, config.d_ff, config.dropout);

        let residual_vs = vs / "residual";
        let residual = [0, 1].map(|i| ResidualConnection::new(&(&residual_vs / i), config.dropout, config.layer_norm_eps));

        Ok(Self {
            self_attention,
            feed_forward,
            residual,
        })
    }

    pub fn forward(&self, x: &Tensor, src_mask: Option<&Tensor>, train: bool) -> Result<Tensor> {
        self.forward_with_scores(x, src_mask, train).map(|(y, _)| y)
    }

    /// Also returns the self-attention weights [batch, n_head, src_len, src_len].
    pub fn forward_with_scores(&self, x: &Tensor, src_mask: Option<&Tensor>, train: bool) -> Result<(Tensor, Tensor)> {
        let (x, scores) = self.residual[0].forward_with(
            x,
            |h| self.self_attention.forward_with_scores(h, h, h, src_mask, train),
            train,
        )?;
        let x = self.residual[1].forward(&x, |h| Ok(self.feed_forward.forward(h, train)), train)?;
        Ok((x, scores))
    }
}

/// Stack of encoder blocks followed by a final layer norm.
#[derive(Debug)]
pub struct Encoder {
    layers: Vec<EncoderBlock>,
    norm: LayerNormalization,
}

impl Encoder {
    pub fn new(vs: &nn::Path, config: &ModelConfig) -> Result<Self> {
        let layers_vs = vs / "layers";
        let layers = (0..config.n_layers)
            .map(|i| EncoderBlock::new(&(&layers_vs / i), config))
            .collect::<Result<Vec<_>>>()?;
        let norm = LayerNormalization::new(&(vs / "norm"), config.layer_norm_eps);

        Ok(Self { layers, norm })
    }

    /// x: [batch, src_len, d_model] (embedded and position-encoded)
    pub fn forward(&self, x: &Tensor, src_mask: Option<&Tensor>, train: bool) -> Result<Tensor> {
        let mut x = x.shallow_clone();
        for layer in &self.layers {
            x = layer.forward(&x, src_mask, train)?;
        }
        Ok(self.norm.forward(&x))
    }

    /// Same as `forward`, plus the self-attention weights of every block, first block first.
    pub fn forward_with_scores(
        &self,
        x: &Tensor,
        src_mask: Option<&Tensor>,
        train: bool,
    ) -> Result<(Tensor, Vec<Tensor>)> {
        let mut x = x.shallow_clone();
        let mut scores = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let (y, layer_scores) = layer.forward_with_scores(&x, src_mask, train)?;
            x = y;
            scores.push(layer_scores);
        }
        Ok((self.norm.forward(&x), scores))
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}
