use tch::{nn, Tensor};

use crate::error::Result;
use crate::layer_norm::LayerNormalization;

/// Pre-norm residual wrapper: x + dropout(sublayer(norm(x))).
#[derive(Debug)]
pub struct ResidualConnection {
    norm: LayerNormalization,
    dropout: f64,
}

impl ResidualConnection {
    pub fn new(vs: &nn::Path, dropout: f64, eps: f64) -> Self {
        let norm = LayerNormalization::new(&(vs / "norm"), eps);
        Self { norm, dropout }
    }

    pub fn forward<F>(&self, x: &Tensor, sublayer: F, train: bool) -> Result<Tensor>
    where
        F: FnOnce(&Tensor) -> Result<Tensor>,
    {
        self.forward_with(x, |h| sublayer(h).map(|out| (out, ())), train)
            .map(|(y, ())| y)
    }

    /// Like `forward`, passing through whatever extra value the sublayer returns.
    pub fn forward_with<F, A>(&self, x: &Tensor, sublayer: F, train: bool) -> Result<(Tensor, A)>
    where
        F: FnOnce(&Tensor) -> Result<(Tensor, A)>,
    {
        let (out, aux) = sublayer(&self.norm.forward(x))?;
        Ok((x + out.dropout(self.dropout, train), aux))
    }
}
