use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Torch error: {0}")]
    Tch(#[from] tch::TchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid model config: {0}")]
    InvalidConfig(String),

    #[error("d_model ({d_model}) is not divisible by the number of heads ({n_heads})")]
    HeadsMismatch { d_model: i64, n_heads: i64 },

    #[error("Sequence length {len} exceeds positional table size {max}")]
    SequenceTooLong { len: i64, max: i64 },
}

pub type Result<T> = std::result::Result<T, ModelError>;
