pub mod attention;
pub mod config;
pub mod decoder;
pub mod embedding;
pub mod encoder;
pub mod error;
pub mod feed_forward;
pub mod init;
pub mod layer_norm;
pub mod mask;
pub mod positional;
pub mod projection;
pub mod residual;
pub mod transformer;

pub use config::ModelConfig;
pub use decoder::DecoderScores;
pub use error::{ModelError, Result};
pub use mask::{causal_mask, decoder_mask, padding_mask};
pub use transformer::{build_transformer, Transformer};
