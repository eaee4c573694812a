use log::debug;
use tch::{nn, Tensor};

use crate::config::ModelConfig;
use crate::decoder::{Decoder, DecoderScores};
use crate::embedding::InputEmbeddings;
use crate::encoder::Encoder;
use crate::error::Result;
use crate::positional::PositionalEncoding;
use crate::projection::ProjectionLayer;

/// Encoder-decoder Transformer over separate source and target vocabularies.
#[derive(Debug)]
pub struct Transformer {
    encoder: Encoder,
    decoder: Decoder,
    src_embed: InputEmbeddings,
    tgt_embed: InputEmbeddings,
    src_pos: PositionalEncoding,
    tgt_pos: PositionalEncoding,
    projection: ProjectionLayer,
    config: ModelConfig,
}

impl Transformer {
    /// Builds every sublayer under `vs`. Blocks never share weights.
    pub fn new(vs: &nn::Path, config: &ModelConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            "building transformer: d_model={} layers={} heads={} d_ff={} src_vocab={} tgt_vocab={}",
            config.d_model, config.n_layers, config.n_heads, config.d_ff, config.src_vocab_size, config.tgt_vocab_size
        );

        let src_embed = InputEmbeddings::new(&(vs / "src_embed"), config.d_model, config.src_vocab_size);
        let tgt_embed = InputEmbeddings::new(&(vs / "tgt_embed"), config.d_model, config.tgt_vocab_size);

        let src_pos = PositionalEncoding::new(config.d_model, config.src_seq_len, config.dropout, vs.device());
        let tgt_pos = PositionalEncoding::new(config.d_model, config.tgt_seq_len, config.dropout, vs.device());

        let encoder = Encoder::new(&(vs / "encoder"), config)?;
        let decoder = Decoder::new(&(vs / "decoder"), config)?;

        let projection = ProjectionLayer::new(&(vs / "projection"), config.d_model, config.tgt_vocab_size);

        Ok(Self {
            encoder,
            decoder,
            src_embed,
            tgt_embed,
            src_pos,
            tgt_pos,
            projection,
            config: config.clone(),
        })
    }

    /// src: [batch, src_len] token ids -> [batch, src_len, d_model]
    pub fn encode(&self, src: &Tensor, src_mask: Option<&Tensor>, train: bool) -> Result<Tensor> {
        let x = self.src_embed.forward(src);
        let x = self.src_pos.forward(&x, train)?;
        self.encoder.forward(&x, src_mask, train)
    }

    /// tgt: [batch, tgt_len] token ids -> [batch, tgt_len, d_model]
    pub fn decode(
        &self,
        encoder_output: &Tensor,
        src_mask: Option<&Tensor>,
        tgt: &Tensor,
        tgt_mask: Option<&Tensor>,
        train: bool,
    ) -> Result<Tensor> {
        let x = self.tgt_embed.forward(tgt);
        let x = self.tgt_pos.forward(&x, train)?;
        self.decoder.forward(&x, encoder_output, src_mask, tgt_mask, train)
    }

    /// Like `encode`, also returning each encoder block's self-attention weights.
    pub fn encode_with_scores(
        &self,
        src: &Tensor,
        src_mask: Option<&Tensor>,
        train: bool,
    ) -> Result<(Tensor, Vec<Tensor>)> {
        let x = self.src_embed.forward(src);
        let x = self.src_pos.forward(&x, train)?;
        self.encoder.forward_with_scores(&x, src_mask, train)
    }

    /// Like `decode`, also returning each decoder block's self- and cross-attention weights.
    pub fn decode_with_scores(
        &self,
        encoder_output: &Tensor,
        src_mask: Option<&Tensor>,
        tgt: &Tensor,
        tgt_mask: Option<&Tensor>,
        train: bool,
    ) -> Result<(Tensor, Vec<DecoderScores>)> {
        let x = self.tgt_embed.forward(tgt);
        let x = self.tgt_pos.forward(&x, train)?;
        self.decoder.forward_with_scores(&x, encoder_output, src_mask, tgt_mask, train)
    }

    /// [batch, tgt_len, d_model] -> [batch, tgt_len, tgt_vocab_size] log-probabilities
    pub fn project(&self, x: &Tensor) -> Tensor {
        self.projection.forward(x)
    }

    /// Encode, decode and project in one pass over a full target sequence.
    pub fn forward(
        &self,
        src: &Tensor,
        src_mask: Option<&Tensor>,
        tgt: &Tensor,
        tgt_mask: Option<&Tensor>,
        train: bool,
    ) -> Result<Tensor> {
        let memory = self.encode(src, src_mask, train)?;
        let out = self.decode(&memory, src_mask, tgt, tgt_mask, train)?;
        Ok(self.project(&out))
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }
}

/// Creates a transformer in `vs` with xavier-uniform init on every matrix parameter.
pub fn build_transformer(vs: &nn::Path, config: &ModelConfig) -> Result<Transformer> {
    Transformer::new(vs, config)
}
