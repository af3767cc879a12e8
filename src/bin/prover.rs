use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use semaphore_registry::{
    config::Config,
    types::{SignalProof, Word},
    SignalProver,
};
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Generates a Halo2 proof for a signal's public inputs.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Group Merkle root the proof is made against
    #[arg(long)]
    root: Word,

    #[arg(long)]
    nullifier_hash: Word,

    #[arg(long)]
    signal: Word,

    #[arg(long)]
    external_nullifier: Word,

    #[arg(short, long, default_value = "proof.json")]
    output: PathBuf,

    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load_from_file_or_default(&args.config)?;

    let mut signal_proof = SignalProof {
        merkle_tree_root: args.root,
        nullifier_hash: args.nullifier_hash,
        signal: args.signal,
        external_nullifier: args.external_nullifier,
        proof: String::new(),
        timestamp: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("System clock is before the Unix epoch")?
            .as_secs(),
    };

    info!("Setting up prover with k = {}", config.proof.circuit_k);
    let prover = SignalProver::new(config.proof.circuit_k)
        .map_err(|e| anyhow::anyhow!("Key generation failed: {e:?}"))?;

    info!("Generating proof...");
    let proof = prover
        .prove(&signal_proof.public_inputs())
        .context("Failed to create proof")?;
    info!("Proof generated, size: {} bytes", proof.len());
    signal_proof.proof = hex::encode(proof);

    let json_output =
        serde_json::to_string_pretty(&signal_proof).context("Failed to serialize proof to JSON")?;
    fs::write(&args.output, json_output)
        .with_context(|| format!("Failed to write proof file: {}", args.output.display()))?;

    println!("Proof written to {}", args.output.display());
    println!("Merkle root: {}", signal_proof.merkle_tree_root);
    println!("Nullifier hash: {}", signal_proof.nullifier_hash);

    Ok(())
}
