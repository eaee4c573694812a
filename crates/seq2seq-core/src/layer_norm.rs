use tch::{nn, Tensor};

/// Layer normalization with a single learnable gain and bias shared across features.
#[derive(Debug)]
pub struct LayerNormalization {
    alpha: Tensor,
    bias: Tensor,
    eps: f64,
}

impl LayerNormalization {
    pub fn new(vs: &nn::Path, eps: f64) -> Self {
        let alpha = vs.var("alpha", &[1], nn::Init::Const(1.0));
        let bias = vs.var("bias", &[1], nn::Init::Const(0.0));
        Self { alpha, bias, eps }
    }

    /// Forward pass:
    /// x: [batch, seq_len, d_model]
    pub fn forward(&self, x: &Tensor) -> Tensor {
        // Unbiased std over the feature dim; eps keeps constant rows finite.
        let mean = x.mean_dim(Some(&[-1i64][..]), true, x.kind());
        let std = x.std_dim(Some(&[-1i64][..]), true, true);

        (x - mean) / (std + self.eps) * &self.alpha + &self.bias
    }
}
