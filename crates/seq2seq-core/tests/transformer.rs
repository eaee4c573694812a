use seq2seq_core::{build_transformer, causal_mask, decoder_mask, padding_mask, ModelConfig, ModelError, Transformer};
use tch::{nn, Device, IndexOp, Kind, Tensor};

const PAD: i64 = 0;

fn small_config() -> ModelConfig {
    ModelConfig {
        d_model: 16,
        n_layers: 2,
        n_heads: 4,
        d_ff: 32,
        ..ModelConfig::new(40, 50, 12, 10)
    }
}

fn build(config: &ModelConfig) -> (nn::VarStore, Transformer) {
    let vs = nn::VarStore::new(Device::Cpu);
    let model = build_transformer(&vs.root(), config).unwrap();
    (vs, model)
}

fn tokens(ids: &[i64], batch: i64) -> Tensor {
    Tensor::from_slice(ids).view([batch, -1])
}

#[test]
fn encode_decode_project_shapes() {
    tch::manual_seed(100);
    let (_vs, model) = build(&small_config());

    let src = tokens(&[5, 6, 7, 8, 0, 0, 9, 3, 2, 1, 4, 0], 2);
    let tgt = tokens(&[1, 11, 12, 0, 1, 21, 22, 23], 2);
    let src_mask = padding_mask(&src, PAD);
    let tgt_mask = decoder_mask(&tgt, PAD).unwrap();

    let memory = model.encode(&src, Some(&src_mask), false).unwrap();
    assert_eq!(memory.size(), vec![2, 6, 16]);

    let out = model.decode(&memory, Some(&src_mask), &tgt, Some(&tgt_mask), false).unwrap();
    assert_eq!(out.size(), vec![2, 4, 16]);

    let log_probs = model.project(&out);
    assert_eq!(log_probs.size(), vec![2, 4, 50]);

    let sums = log_probs.exp().sum_dim_intlist(Some(&[-1i64][..]), false, Kind::Float);
    assert!((sums - 1.0).abs().max().double_value(&[]) < 1e-5);
}

#[test]
fn forward_matches_the_three_steps() {
    tch::manual_seed(101);
    let (_vs, model) = build(&small_config());

    let src = tokens(&[3, 4, 5, 6], 1);
    let tgt = tokens(&[1, 7, 8], 1);
    let src_mask = padding_mask(&src, PAD);
    let tgt_mask = decoder_mask(&tgt, PAD).unwrap();

    let memory = model.encode(&src, Some(&src_mask), false).unwrap();
    let out = model.decode(&memory, Some(&src_mask), &tgt, Some(&tgt_mask), false).unwrap();
    let stepwise = model.project(&out);

    let fused = model.forward(&src, Some(&src_mask), &tgt, Some(&tgt_mask), false).unwrap();
    assert!(fused.allclose(&stepwise, 1e-6, 1e-6, false));
}

#[test]
fn attention_weights_come_back_from_a_built_model() {
    tch::manual_seed(107);
    let config = small_config();
    let (_vs, model) = build(&config);

    let src = tokens(&[5, 6, 7, 8, 9, PAD, 3, 2, 1, 4, PAD, PAD], 2);
    let tgt = tokens(&[1, 11, 12, 1, 21, 22], 2);
    let src_mask = padding_mask(&src, PAD);
    let tgt_mask = decoder_mask(&tgt, PAD).unwrap();

    let (memory, encoder_scores) = model.encode_with_scores(&src, Some(&src_mask), false).unwrap();
    assert_eq!(encoder_scores.len(), config.n_layers as usize);
    for scores in &encoder_scores {
        assert_eq!(scores.size(), vec![2, 4, 6, 6]);
    }

    let (out, decoder_scores) = model
        .decode_with_scores(&memory, Some(&src_mask), &tgt, Some(&tgt_mask), false)
        .unwrap();
    assert_eq!(decoder_scores.len(), config.n_layers as usize);

    let plain = model.decode(&memory, Some(&src_mask), &tgt, Some(&tgt_mask), false).unwrap();
    assert!(out.allclose(&plain, 1e-6, 1e-6, false));

    for scores in &decoder_scores {
        assert_eq!(scores.self_attention.size(), vec![2, 4, 3, 3]);

        let cross = &scores.cross_attention;
        assert_eq!(cross.size(), vec![2, 4, 3, 6]);
        let row_sums = cross.sum_dim_intlist(Some(&[-1i64][..]), false, Kind::Float);
        assert!((row_sums - 1.0).abs().max().double_value(&[]) < 1e-5);

        // Padded source positions receive no cross-attention.
        assert!(cross.i((0, .., .., 5..)).abs().max().double_value(&[]) < 1e-6);
        assert!(cross.i((1, .., .., 4..)).abs().max().double_value(&[]) < 1e-6);
    }
}

#[test]
fn eval_is_deterministic_and_train_is_not() {
    tch::manual_seed(102);
    let (_vs, model) = build(&ModelConfig {
        dropout: 0.3,
        ..small_config()
    });

    let src = tokens(&[3, 4, 5, 6, 7, 8], 1);
    let eval_a = model.encode(&src, None, false).unwrap();
    let eval_b = model.encode(&src, None, false).unwrap();
    assert!(eval_a.allclose(&eval_b, 0.0, 0.0, false));

    let train_a = model.encode(&src, None, true).unwrap();
    let train_b = model.encode(&src, None, true).unwrap();
    assert!(!train_a.allclose(&train_b, 1e-6, 1e-6, false));
}

#[test]
fn decoder_does_not_see_future_targets() {
    tch::manual_seed(103);
    let (_vs, model) = build(&small_config());

    let src = tokens(&[3, 4, 5, 6, 7], 1);
    let memory = model.encode(&src, None, false).unwrap();
    let tgt_mask = causal_mask(5, Device::Cpu);

    let tgt_a = tokens(&[1, 10, 11, 12, 13], 1);
    let tgt_b = tokens(&[1, 10, 30, 31, 32], 1);
    let out_a = model.decode(&memory, None, &tgt_a, Some(&tgt_mask), false).unwrap();
    let out_b = model.decode(&memory, None, &tgt_b, Some(&tgt_mask), false).unwrap();

    assert!(out_a.i((.., ..2, ..)).allclose(&out_b.i((.., ..2, ..)), 1e-5, 1e-5, false));
    assert!(!out_a.i((.., 2.., ..)).allclose(&out_b.i((.., 2.., ..)), 1e-5, 1e-5, false));
}

#[test]
fn padded_source_positions_are_ignored() {
    tch::manual_seed(104);
    let (_vs, model) = build(&small_config());

    let src_a = tokens(&[3, 4, 5, PAD, PAD], 1);
    let src_mask = padding_mask(&src_a, PAD);
    // Same real tokens; the padded slots carry other ids but stay masked.
    let src_b = tokens(&[3, 4, 5, 17, 18], 1);

    let tgt = tokens(&[1, 9, 10], 1);
    let tgt_mask = causal_mask(3, Device::Cpu);

    let out_a = model.forward(&src_a, Some(&src_mask), &tgt, Some(&tgt_mask), false).unwrap();
    let out_b = model.forward(&src_b, Some(&src_mask), &tgt, Some(&tgt_mask), false).unwrap();
    assert!(out_a.allclose(&out_b, 1e-5, 1e-5, false));
}

#[test]
fn rejects_sequences_longer_than_configured() {
    let (_vs, model) = build(&small_config());

    let src = Tensor::ones([1, 13], (Kind::Int64, Device::Cpu));
    assert!(matches!(
        model.encode(&src, None, false),
        Err(ModelError::SequenceTooLong { len: 13, max: 12 })
    ));

    let memory = model.encode(&src.narrow(1, 0, 4), None, false).unwrap();
    let tgt = Tensor::ones([1, 11], (Kind::Int64, Device::Cpu));
    assert!(matches!(
        model.decode(&memory, None, &tgt, None, false),
        Err(ModelError::SequenceTooLong { len: 11, max: 10 })
    ));
}

#[test]
fn build_rejects_invalid_config() {
    let vs = nn::VarStore::new(Device::Cpu);
    let config = ModelConfig {
        n_heads: 3,
        ..small_config()
    };
    assert!(matches!(
        build_transformer(&vs.root(), &config),
        Err(ModelError::HeadsMismatch { d_model: 16, n_heads: 3 })
    ));
}

#[test]
fn parameter_layout_and_count() {
    let config = small_config();
    let (vs, model) = build(&config);
    assert_eq!(model.config(), &config);

    let vars = vs.variables();
    for name in [
        "src_embed.embedding.weight",
        "tgt_embed.embedding.weight",
        "encoder.layers.0.self_attention.w_q.weight",
        "encoder.layers.1.feed_forward.linear_2.bias",
        "encoder.norm.alpha",
        "decoder.layers.1.cross_attention.w_o.weight",
        "decoder.layers.1.residual.2.norm.alpha",
        "decoder.norm.bias",
        "projection.proj.weight",
        "projection.proj.bias",
    ] {
        assert!(vars.contains_key(name), "missing {}", name);
    }

    let (d, ff) = (config.d_model, config.d_ff);
    let feed_forward = d * ff + ff + ff * d + d;
    let encoder_block = 4 * d * d + feed_forward + 2 * 2;
    let decoder_block = 8 * d * d + feed_forward + 3 * 2;
    let expected = config.src_vocab_size * d
        + config.tgt_vocab_size * d
        + config.n_layers * (encoder_block + decoder_block)
        + 2 * 2
        + d * config.tgt_vocab_size
        + config.tgt_vocab_size;

    let total: i64 = vs.trainable_variables().iter().map(|t| t.numel() as i64).sum();
    assert_eq!(total, expected);
}

#[test]
fn matrices_start_xavier_uniform() {
    tch::manual_seed(105);
    let config = small_config();
    let (vs, _model) = build(&config);
    let vars = vs.variables();

    let check = |name: &str, fan_in: i64, fan_out: i64| {
        let bound = (6.0 / (fan_in + fan_out) as f64).sqrt();
        let max = vars[name].abs().max().double_value(&[]);
        assert!(max <= bound + 1e-6, "{} exceeds xavier bound: {} > {}", name, max, bound);
    };

    check("encoder.layers.0.self_attention.w_k.weight", 16, 16);
    check("decoder.layers.1.feed_forward.linear_1.weight", 16, 32);
    check("src_embed.embedding.weight", 16, 40);
    check("projection.proj.weight", 16, 50);

    assert_eq!(vars["encoder.layers.0.residual.0.norm.alpha"].double_value(&[0]), 1.0);
    assert_eq!(vars["encoder.layers.0.residual.0.norm.bias"].double_value(&[0]), 0.0);
}

#[test]
fn gradients_reach_both_stacks() {
    tch::manual_seed(106);
    let (vs, model) = build(&small_config());

    let src = tokens(&[3, 4, 5, 6], 1);
    let tgt = tokens(&[1, 7, 8], 1);
    let labels = tokens(&[7, 8, 2], 1);
    let tgt_mask = causal_mask(3, Device::Cpu);

    let log_probs = model.forward(&src, None, &tgt, Some(&tgt_mask), true).unwrap();
    let loss = log_probs.view([-1, 50]).nll_loss(&labels.view([-1]));
    loss.backward();

    let vars = vs.variables();
    for name in [
        "encoder.layers.0.self_attention.w_q.weight",
        "decoder.layers.1.cross_attention.w_v.weight",
        "src_embed.embedding.weight",
    ] {
        let grad = vars[name].grad();
        assert!(grad.defined(), "no gradient for {}", name);
        assert!(grad.abs().sum(Kind::Float).double_value(&[]) > 0.0, "zero gradient for {}", name);
    }
}
