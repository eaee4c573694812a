use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use log::{info, warn};
use tch::{nn, Device, Kind, Tensor};

use seq2seq_core::{build_transformer, decoder_mask, padding_mask, ModelConfig};

const PAD: i64 = 0;

/// Builds a seq2seq transformer from a config and checks one forward pass.
#[derive(Parser)]
struct Cli {
    /// Model config (.yaml/.yml or .json). Uses a small built-in config when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long, default_value_t = 2)]
    batch_size: i64,
    /// Source length of the sample batch (defaults to the configured maximum).
    #[arg(long)]
    src_len: Option<i64>,
    /// Target length of the sample batch (defaults to the configured maximum).
    #[arg(long)]
    tgt_len: Option<i64>,
    #[arg(long, default_value_t = 42)]
    seed: i64,
    /// Run on CUDA when available.
    #[arg(long)]
    cuda: bool,
}

fn default_config() -> ModelConfig {
    ModelConfig {
        d_model: 64,
        n_layers: 2,
        n_heads: 4,
        d_ff: 256,
        ..ModelConfig::new(1000, 1000, 64, 64)
    }
}

/// Random token ids in [1, vocab) with the last `pad` positions of each row set to PAD.
fn random_tokens(batch: i64, len: i64, vocab: i64, pad: i64, device: Device) -> Tensor {
    let ids = Tensor::randint_low(1, vocab.max(2), [batch, len], (Kind::Int64, device));
    if pad > 0 && pad < len {
        let _ = ids.narrow(1, len - pad, pad).fill_(PAD);
    }
    ids
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ModelConfig::from_file(path)
            .with_context(|| format!("Failed to load model config at {:?}", path))?,
        None => {
            warn!("No --config given, using built-in small config");
            default_config()
        }
    };

    let device = if cli.cuda { Device::cuda_if_available() } else { Device::Cpu };
    info!("Using device: {:?}", device);
    tch::manual_seed(cli.seed);

    let vs = nn::VarStore::new(device);
    let model = build_transformer(&vs.root(), &config).context("Failed to build transformer")?;

    // Parameter counts grouped by top-level component.
    let mut groups: BTreeMap<String, i64> = BTreeMap::new();
    for (name, tensor) in vs.variables() {
        let group = name.split('.').next().unwrap_or_default().to_string();
        *groups.entry(group).or_insert(0) += tensor.numel() as i64;
    }
    let total: i64 = groups.values().sum();

    println!("{:#?}", model.config());
    println!("{:<12} {:>14}", "component", "parameters");
    for (group, count) in &groups {
        println!("{:<12} {:>14}", group, count);
    }
    println!("{:<12} {:>14}", "total", total);

    let src_len = cli.src_len.unwrap_or(config.src_seq_len);
    let tgt_len = cli.tgt_len.unwrap_or(config.tgt_seq_len);
    ensure!(cli.batch_size > 0 && src_len > 0 && tgt_len > 0, "sample batch dimensions must be positive");

    let src = random_tokens(cli.batch_size, src_len, config.src_vocab_size, src_len / 4, device);
    let tgt = random_tokens(cli.batch_size, tgt_len, config.tgt_vocab_size, tgt_len / 4, device);
    let src_mask = padding_mask(&src, PAD);
    let tgt_mask = decoder_mask(&tgt, PAD).context("Failed to build target mask")?;

    let log_probs = tch::no_grad(|| model.forward(&src, Some(&src_mask), &tgt, Some(&tgt_mask), false))
        .context("Forward pass failed")?;

    let sums = log_probs.exp().sum_dim_intlist(Some(&[-1i64][..]), false, Kind::Float);
    let max_dev = (sums - 1.0).abs().max().double_value(&[]);
    info!("Max deviation of probability mass from 1: {:e}", max_dev);
    ensure!(max_dev < 1e-3, "output rows do not normalize (max deviation {})", max_dev);

    println!("src {:?} -> log-probs {:?}", src.size(), log_probs.size());
    Ok(())
}
