use tch::{Device, Tensor};

use crate::error::{ModelError, Result};

/// Fixed sinusoidal position table, added to the embeddings and followed by dropout.
///
/// The table is a plain tensor rather than a var-store entry, so it is neither
/// trained nor saved with the parameters.
#[derive(Debug)]
pub struct PositionalEncoding {
    pe: Tensor,
    max_len: i64,
    dropout: f64,
}

impl PositionalEncoding {
    pub fn new(d_model: i64, max_len: i64, dropout: f64, device: Device) -> Self {
        // pe[p, 2i] = sin(p * w_i), pe[p, 2i + 1] = cos(p * w_i)
        // w_i = exp(-ln(10000) * 2i / d_model)
        let log_base = -(10000.0f64).ln() / d_model as f64;
        let mut table = Vec::with_capacity((max_len * d_model) as usize);
        for pos in 0..max_len {
            for col in 0..d_model {
                let even = col - col % 2;
                let angle = pos as f64 * (even as f64 * log_base).exp();
                let value = if col % 2 == 0 { angle.sin() } else { angle.cos() };
                table.push(value as f32);
            }
        }

        let pe = Tensor::from_slice(&table)
            .view([1, max_len, d_model])
            .to(device);

        Self { pe, max_len, dropout }
    }

    /// x: [batch, seq_len, d_model]
    pub fn forward(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let (_, seq_len, _) = x.size3()?;
        if seq_len > self.max_len {
            return Err(ModelError::SequenceTooLong {
                len: seq_len,
                max: self.max_len,
            });
        }

        let pe = self.pe.narrow(1, 0, seq_len);
        Ok((x + pe).dropout(self.dropout, train))
    }

    pub fn max_len(&self) -> i64 {
        self.max_len
    }

    pub fn table(&self) -> &Tensor {
        &self.pe
    }
}
