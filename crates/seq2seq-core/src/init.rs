use tch::nn;

/// Glorot/Xavier uniform init: U(-b, b) with b = sqrt(6 / (fan_in + fan_out)).
pub fn xavier_uniform(fan_in: i64, fan_out: i64) -> nn::Init {
    let bound = (6.0 / (fan_in + fan_out) as f64).sqrt();
    nn::Init::Uniform { lo: -bound, up: bound }
}

/// Linear layer config with a xavier-initialized weight. The bias keeps the tch default.
pub fn linear_config(in_dim: i64, out_dim: i64, bias: bool) -> nn::LinearConfig {
    nn::LinearConfig {
        ws_init: xavier_uniform(in_dim, out_dim),
        bias,
        ..Default::default()
    }
}
