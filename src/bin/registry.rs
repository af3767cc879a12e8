use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use log::{debug, info};
use semaphore_registry::{
    config::Config,
    deployment::{Deployment, Snapshot},
    types::{Event, GroupId, ReputationId, SignalProof, Word},
    Address, Context, Halo2Verifier,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Drives the reputation registry and group engine over a JSON state file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// State file, overriding `[state] file` from the config
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Address the operation is performed as
    #[arg(long)]
    caller: Address,

    /// Unix time of the operation (defaults to now)
    #[arg(long)]
    timestamp: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Deploy a fresh registry and group engine owned by the caller
    Init {
        #[arg(long)]
        force: bool,
    },
    AddReputation {
        #[arg(long)]
        id: ReputationId,
        #[arg(long)]
        admin: Address,
        #[arg(long)]
        name: String,
        #[arg(long)]
        content_uri: String,
        #[arg(long)]
        valid_from: u64,
        #[arg(long)]
        valid_until: u64,
    },
    UpdateReputationUri {
        #[arg(long)]
        id: ReputationId,
        #[arg(long)]
        content_uri: String,
    },
    UpdateReputationName {
        #[arg(long)]
        id: ReputationId,
        #[arg(long)]
        name: String,
    },
    UpdateReputationAdmin {
        #[arg(long)]
        id: ReputationId,
        #[arg(long)]
        admin: Address,
    },
    RemoveReputation {
        #[arg(long)]
        id: ReputationId,
    },
    TransferOwnership {
        #[arg(long)]
        new_owner: Address,
    },
    CreateGroup {
        #[arg(long)]
        reputation_id: ReputationId,
        #[arg(long)]
        group_id: GroupId,
        #[arg(long, default_value_t = 20)]
        depth: u8,
        /// Root expiry in seconds (defaults to `[semaphore] default_root_expiry_secs`)
        #[arg(long)]
        expiry: Option<u64>,
    },
    UpdateGroupAdmin {
        #[arg(long)]
        group_id: GroupId,
        #[arg(long)]
        admin: Address,
    },
    UpdateGroupDuration {
        #[arg(long)]
        group_id: GroupId,
        #[arg(long)]
        duration: u64,
    },
    AddMember {
        #[arg(long)]
        group_id: GroupId,
        #[arg(long)]
        identity_commitment: Word,
    },
    AddMembers {
        #[arg(long)]
        group_id: GroupId,
        #[arg(long, num_args = 1.., required = true)]
        identity_commitments: Vec<Word>,
    },
    /// Replace a member; the Merkle path is taken from the stored tree
    UpdateMember {
        #[arg(long)]
        group_id: GroupId,
        #[arg(long)]
        index: u64,
        #[arg(long)]
        identity_commitment: Word,
        #[arg(long)]
        new_identity_commitment: Word,
    },
    /// Remove a member; the Merkle path is taken from the stored tree
    RemoveMember {
        #[arg(long)]
        group_id: GroupId,
        #[arg(long)]
        index: u64,
        #[arg(long)]
        identity_commitment: Word,
    },
    VerifyProof {
        #[arg(long)]
        group_id: GroupId,
        #[arg(short, long)]
        proof_file: PathBuf,
    },
    ShowGroup {
        #[arg(long)]
        group_id: GroupId,
    },
    ShowReputation {
        #[arg(long)]
        id: ReputationId,
    },
}

fn now() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("System clock is before the Unix epoch")?
        .as_secs())
}

fn print_events(events: &[Event]) -> Result<()> {
    for event in events {
        println!(
            "{}",
            serde_json::to_string(event).context("Failed to serialize event")?
        );
    }
    Ok(())
}

fn load_signal_proof(path: &Path, max_proof_size: usize) -> Result<(SignalProof, Vec<u8>)> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read proof file: {}", path.display()))?;
    let signal_proof: SignalProof = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse proof file: {}", path.display()))?;
    let proof = signal_proof.decode_proof(max_proof_size)?;
    debug!("Loaded proof of {} bytes", proof.len());
    Ok((signal_proof, proof))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load_from_file_or_default(&args.config)?;
    let state_file = args.state.clone().unwrap_or_else(|| config.state.file.clone());
    let ctx = Context::new(
        args.caller,
        match args.timestamp {
            Some(timestamp) => timestamp,
            None => now()?,
        },
    );

    let verifier = Halo2Verifier::new(config.proof.circuit_k)
        .map_err(|e| anyhow::anyhow!("Verifying key generation failed: {e:?}"))?
        .with_max_proof_size(config.proof.max_proof_size);

    let mut deployment = match args.command {
        Command::Init { force } => {
            if state_file.exists() && !force {
                return Err(anyhow::anyhow!(
                    "State file already exists: {}. Pass --force to overwrite it.",
                    state_file.display()
                ));
            }
            Deployment::deploy(ctx.caller, verifier, ctx.timestamp)?
        }
        _ => Deployment::from_snapshot(Snapshot::load(&state_file)?, verifier),
    };
    let Deployment {
        contracts,
        semaphore,
        registry,
    } = &mut deployment;

    match args.command {
        Command::Init { .. } => {
            let book = contracts.save(&config.deployment.dir, &config.network)?;
            info!("Address book written to {}", book.display());
            println!(
                "Registry: {}\nSemaphore: {}\nVerifier: {}",
                contracts.registry, contracts.semaphore, contracts.verifier
            );
        }
        Command::AddReputation {
            id,
            admin,
            name,
            content_uri,
            valid_from,
            valid_until,
        } => registry.add_reputation(&ctx, id, admin, name, content_uri, valid_from, valid_until)?,
        Command::UpdateReputationUri { id, content_uri } => {
            registry.update_reputation_uri(&ctx, id, content_uri)?
        }
        Command::UpdateReputationName { id, name } => {
            registry.update_reputation_name(&ctx, id, name)?
        }
        Command::UpdateReputationAdmin { id, admin } => {
            registry.update_reputation_admin(&ctx, id, admin)?
        }
        Command::RemoveReputation { id } => registry.remove_reputation(&ctx, id)?,
        Command::TransferOwnership { new_owner } => registry.transfer_ownership(&ctx, new_owner)?,
        Command::CreateGroup {
            reputation_id,
            group_id,
            depth,
            expiry,
        } => registry.create_group_with_expiry(
            &ctx,
            semaphore,
            reputation_id,
            group_id,
            depth,
            expiry.unwrap_or(config.semaphore.default_root_expiry_secs),
        )?,
        Command::UpdateGroupAdmin { group_id, admin } => {
            semaphore.update_group_admin(&ctx, group_id, admin)?
        }
        Command::UpdateGroupDuration { group_id, duration } => {
            semaphore.update_group_merkle_tree_duration(&ctx, group_id, duration)?
        }
        Command::AddMember {
            group_id,
            identity_commitment,
        } => {
            let root = semaphore.add_member(&ctx, group_id, identity_commitment)?;
            println!("Merkle root: {root}");
        }
        Command::AddMembers {
            group_id,
            identity_commitments,
        } => {
            let root = semaphore.add_members(&ctx, group_id, &identity_commitments)?;
            println!("Merkle root: {root}");
        }
        Command::UpdateMember {
            group_id,
            index,
            identity_commitment,
            new_identity_commitment,
        } => {
            let path = semaphore.get_merkle_proof(group_id, index)?;
            debug!("Merkle path for group {group_id}:\n{path}");
            let root = semaphore.update_member(
                &ctx,
                group_id,
                index,
                identity_commitment,
                new_identity_commitment,
                &path.siblings,
            )?;
            println!("Merkle root: {root}");
        }
        Command::RemoveMember {
            group_id,
            index,
            identity_commitment,
        } => {
            let path = semaphore.get_merkle_proof(group_id, index)?;
            debug!("Merkle path for group {group_id}:\n{path}");
            let root =
                semaphore.remove_member(&ctx, group_id, index, identity_commitment, &path.siblings)?;
            println!("Merkle root: {root}");
        }
        Command::VerifyProof {
            group_id,
            proof_file,
        } => {
            let (signal_proof, proof) = load_signal_proof(&proof_file, config.proof.max_proof_size)?;
            semaphore.verify_proof(
                &ctx,
                group_id,
                signal_proof.merkle_tree_root,
                signal_proof.signal,
                signal_proof.nullifier_hash,
                signal_proof.external_nullifier,
                &proof,
            )?;
            println!("✓ Proof verified for group {group_id}");
        }
        Command::ShowGroup { group_id } => {
            let group = semaphore
                .get_group(group_id)
                .with_context(|| format!("Group {group_id} does not exist"))?;
            println!(
                "{}",
                serde_json::to_string_pretty(group).context("Failed to serialize group")?
            );
            return Ok(());
        }
        Command::ShowReputation { id } => {
            let reputation = registry
                .reputation_info(id)
                .with_context(|| format!("Reputation {id} does not exist"))?;
            println!(
                "{}",
                serde_json::to_string_pretty(reputation)
                    .context("Failed to serialize reputation")?
            );
            return Ok(());
        }
    }

    print_events(&registry.take_events())?;
    print_events(&semaphore.take_events())?;
    deployment.snapshot().save(&state_file)?;
    debug!("State saved to {}", state_file.display());

    Ok(())
}
