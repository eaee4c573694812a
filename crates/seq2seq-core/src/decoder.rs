use tch::{nn, Tensor};

use crate::attention::MultiHeadAttentionBlock;
use crate::config::ModelConfig;
use crate::error::Result;
use crate::feed_forward::FeedForwardBlock;
use crate::layer_norm::LayerNormalization;
use crate::residual::ResidualConnection;

/// Decoder block: masked self-attention, cross-attention over the encoder output, feed-forward.
#[derive(Debug)]
pub struct DecoderBlock {
    self_attention: MultiHeadAttentionBlock,
    cross_attention: MultiHeadAttentionBlock,
    feed_forward: FeedForwardBlock,
    residual: [ResidualConnection; 3],
}

impl DecoderBlock {
    pub fn new(vs: &nn::Path, config: &ModelConfig) -> Result<Self> {
        let self_attention =
            MultiHeadAttentionBlock::new(&(vs / "self_attention"), config.d_model, config.n_heads, config.dropout)?;
        let cross_attention =
            MultiHeadAttentionBlock::new(&(vs / "cross_attention"), config.d_model, config.n_heads, config.dropout)?;
        let feed_forward = FeedForwardBlock::new(&(vs / "feed_forward"), config.d_model, config.d_ff, config.dropout);

        let residual_vs = vs / "residual";
        let residual =
            [0, 1, 2].map(|i| ResidualConnection::new(&(&residual_vs / i), config.dropout, config.layer_norm_eps));

        Ok(Self {
            self_attention,
            cross_attention,
            feed_forward,
            residual,
        })
    }

    pub fn forward(
        &self,
        x: &Tensor,
        encoder_output: &Tensor,
        src_mask: Option<&Tensor>,
        tgt_mask: Option<&Tensor>,
        train: bool,
    ) -> Result<Tensor> {
        self.forward_with_scores(x, encoder_output, src_mask, tgt_mask, train)
            .map(|(y, _)| y)
    }

    /// Same as `forward`, also returning this block's attention weights.
    pub fn forward_with_scores(
        &self,
        x: &Tensor,
        encoder_output: &Tensor,
        src_mask: Option<&Tensor>,
        tgt_mask: Option<&Tensor>,
        train: bool,
    ) -> Result<(Tensor, DecoderScores)> {
        let (x, self_attention) = self.residual[0].forward_with(
            x,
            |h| self.self_attention.forward_with_scores(h, h, h, tgt_mask, train),
            train,
        )?;
        let (x, cross_attention) = self.residual[1].forward_with(
            &x,
            |h| self.cross_attention.forward_with_scores(h, encoder_output, encoder_output, src_mask, train),
            train,
        )?;
        let x = self.residual[2].forward(&x, |h| Ok(self.feed_forward.forward(h, train)), train)?;

        Ok((
            x,
            DecoderScores {
                self_attention,
                cross_attention,
            },
        ))
    }
}

/// Post-softmax attention weights of one decoder block.
#[derive(Debug)]
pub struct DecoderScores {
    /// [batch, n_head, tgt_len, tgt_len]
    pub self_attention: Tensor,
    /// [batch, n_head, tgt_len, src_len]
    pub cross_attention: Tensor,
}

/// Stack of decoder blocks followed by a final layer norm.
#[derive(Debug)]
pub struct Decoder {
    layers: Vec<DecoderBlock>,
    norm: LayerNormalization,
}

impl Decoder {
    pub fn new(vs: &nn::Path, config: &ModelConfig) -> Result<Self> {
        let layers_vs = vs / "layers";
        let layers = (0..config.n_layers)
            .map(|i| DecoderBlock::new(&(&layers_vs / i), config))
            .collect::<Result<Vec<_>>>()?;
        let norm = LayerNormalization::new(&(vs / "norm"), config.layer_norm_eps);

        Ok(Self { layers, norm })
    }

    /// x: [batch, tgt_len, d_model], encoder_output: [batch, src_len, d_model]
    pub fn forward(
        &self,
        x: &Tensor,
        encoder_output: &Tensor,
        src_mask: Option<&Tensor>,
        tgt_mask: Option<&Tensor>,
        train: bool,
    ) -> Result<Tensor> {
        let mut x = x.shallow_clone();
        for layer in &self.layers {
            x = layer.forward(&x, encoder_output, src_mask, tgt_mask, train)?;
        }
        Ok(self.norm.forward(&x))
    }

    /// Same as `forward`, plus the attention weights of every block, first block first.
    pub fn forward_with_scores(
        &self,
        x: &Tensor,
        encoder_output: &Tensor,
        src_mask: Option<&Tensor>,
        tgt_mask: Option<&Tensor>,
        train: bool,
    ) -> Result<(Tensor, Vec<DecoderScores>)> {
        let mut x = x.shallow_clone();
        let mut scores = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let (y, layer_scores) = layer.forward_with_scores(&x, encoder_output, src_mask, tgt_mask, train)?;
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
