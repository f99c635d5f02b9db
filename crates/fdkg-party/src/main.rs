//! FDKG Party CLI
//!
//! Command-line participant node:
//! - generate a channel identity
//! - run a distributed key generation round against the log service
//! - produce partial signatures over the resulting final share

use anyhow::Result;
use clap::{Parser, Subcommand};
use fdkg_core::channel::{ChannelIdentity, ShareChannel};
use fdkg_core::keygen::{run_dkg, DkgRound};
use fdkg_core::randomness::{KeyedBeacon, LocalEntropy, OracleEntropy};
use fdkg_core::sign::verify_partial;
use fdkg_core::types::encode_point;
use fdkg_core::{CompletionPolicy, CryptoContext, FinalShare, ParticipantId, RoundConfig, RoundId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use share_log_client::LogClient;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};

/// FDKG Party - DKG participant node
#[derive(Parser)]
#[command(name = "fdkg-party")]
#[command(about = "Threshold DKG participant node")]
#[command(version)]
struct Cli {
    /// Log service URL
    #[arg(short, long, env = "LOG_URL", default_value = "http://127.0.0.1:8080")]
    log: String,

    /// Participant ID (1-indexed)
    #[arg(short, long, env = "PARTICIPANT_ID")]
    participant: ParticipantId,

    /// Data directory for identities and final shares
    #[arg(short, long, env = "DEST", default_value = "./data")]
    dest: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a channel identity and print its public key
    Identity,

    /// Run one distributed key generation round
    Keygen {
        /// Number of participants
        #[arg(short, long)]
        n: u16,

        /// Threshold (t-of-n)
        #[arg(short, long)]
        t: u16,

        /// Finalize on this many verified shares instead of all n
        #[arg(long)]
        quorum: Option<u16>,

        /// Round label; all participants of a round must pass the same one
        #[arg(long, default_value = "default")]
        round_label: String,

        /// Path to the participant public-key directory (JSON)
        #[arg(long)]
        directory: PathBuf,

        /// Seed coefficients from a keyed randomness beacon (hex key)
        #[arg(long)]
        beacon_key: Option<String>,

        /// Round timeout in seconds
        #[arg(long, default_value = "60")]
        timeout: u64,
    },

    /// Produce a partial signature over a message
    Sign {
        /// Message to sign (UTF-8 literal)
        #[arg(short, long)]
        message: String,
    },

    /// Show stored final-share info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    // Ensure data directory exists
    std::fs::create_dir_all(&cli.dest)?;

    match cli.command {
        Commands::Identity => {
            run_identity(&cli)?;
        }
        Commands::Keygen {
            n,
            t,
            quorum,
            ref round_label,
            ref directory,
            ref beacon_key,
            timeout,
        } => {
            run_keygen(&cli, n, t, quorum, round_label, directory, beacon_key.as_deref(), timeout)
                .await?;
        }
        Commands::Sign { ref message } => {
            run_sign(&cli, message)?;
        }
        Commands::Info => {
            show_info(&cli)?;
        }
    }

    Ok(())
}

/// On-disk channel identity
#[derive(Serialize, Deserialize)]
struct StoredIdentity {
    participant: ParticipantId,
    secret_key: String,
    public_key: String,
}

fn run_identity(cli: &Cli) -> Result<()> {
    let identity = ChannelIdentity::generate();
    let stored = StoredIdentity {
        participant: cli.participant,
        secret_key: hex::encode(identity.to_bytes()),
        public_key: hex::encode(identity.public_key()),
    };

    let path = identity_path(cli);
    std::fs::write(&path, serde_json::to_string_pretty(&stored)?)?;

    info!(participant = cli.participant, path = ?path, "Identity generated");
    println!("Public Key: {}", stored.public_key);

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_keygen(
    cli: &Cli,
    n: u16,
    t: u16,
    quorum: Option<u16>,
    round_label: &str,
    directory: &PathBuf,
    beacon_key: Option<&str>,
    timeout: u64,
) -> Result<()> {
    info!(
        participant = cli.participant,
        n,
        threshold = t,
        round_label,
        "Starting DKG round"
    );

    let ctx = CryptoContext::new();
    let round_id = label_to_round_id(round_label);

    let mut config = RoundConfig::new(n, t, cli.participant)?.with_round_id(round_id);
    if let Some(q) = quorum {
        config = config.with_policy(CompletionPolicy::Quorum(q))?;
    }

    let identity = load_identity(cli)?;
    let keys = load_directory(directory, n)?;
    let channel = ShareChannel::new(cli.participant, &identity, keys);
    let log = LogClient::new(&cli.log);

    let mut round = DkgRound::new(ctx.clone(), config);
    let final_share = match beacon_key {
        Some(key) => {
            let key: [u8; 32] = hex::decode(key)?
                .try_into()
                .map_err(|_| anyhow::anyhow!("Beacon key must be 32 bytes"))?;
            let beacon = KeyedBeacon::new(key, "keyed-beacon");
            let mut entropy =
                OracleEntropy::request(&beacon, &ctx, cli.participant, t as usize).await?;
            run_dkg(
                &mut round,
                &channel,
                &mut entropy,
                &log,
                Duration::from_secs(timeout),
            )
            .await?
        }
        None => {
            run_dkg(
                &mut round,
                &channel,
                &mut LocalEntropy,
                &log,
                Duration::from_secs(timeout),
            )
            .await?
        }
    };

    // Save final share
    let path = share_path(cli);
    std::fs::write(&path, serde_json::to_string_pretty(&final_share)?)?;

    info!(
        complaints = round.complaints().count(),
        group_public_key = hex::encode(&final_share.group_public_key),
        path = ?path,
        "DKG round completed, final share saved"
    );

    println!(
        "Group Public Key: {}",
        hex::encode(&final_share.group_public_key)
    );

    Ok(())
}

fn run_sign(cli: &Cli, message: &str) -> Result<()> {
    let final_share = load_share(cli)?;
    let ctx = CryptoContext::new();

    info!(participant = cli.participant, message, "Signing");

    let signer = fdkg_core::sign::ThresholdSigner::new(&ctx, &final_share);
    let signature = signer.sign(message.as_bytes());

    let point = encode_point(&final_share.verifying_point(&ctx));
    if !verify_partial(&ctx, &signature, &point, message.as_bytes())? {
        anyhow::bail!("Partial signature failed self-verification");
    }

    println!("Partial Signature:");
    println!("  participant: {}", signature.participant);
    println!("  R: {}", hex::encode(&signature.big_r));
    println!("  s: {}", hex::encode(signature.s.to_bytes()));
    println!("  digest: {}", hex::encode(&signature.digest));
    println!("  verifying point: {}", hex::encode(&point));

    Ok(())
}

fn show_info(cli: &Cli) -> Result<()> {
    let final_share = load_share(cli)?;

    println!("Final Share Info:");
    println!("  Participant: {}", final_share.participant);
    println!("  N: {}", final_share.n);
    println!("  Threshold: {}", final_share.threshold);
    println!(
        "  Group Public Key: {}",
        hex::encode(&final_share.group_public_key)
    );

    Ok(())
}

fn identity_path(cli: &Cli) -> PathBuf {
    cli.dest.join(format!("identity.{}.json", cli.participant))
}

fn share_path(cli: &Cli) -> PathBuf {
    cli.dest.join(format!("finalshare.{}.json", cli.participant))
}

fn label_to_round_id(label: &str) -> RoundId {
    let mut hasher = Sha256::new();
    hasher.update(b"fdkg/round-label");
    hasher.update(label.as_bytes());
    hasher.finalize().into()
}

fn load_identity(cli: &Cli) -> Result<ChannelIdentity> {
    let path = identity_path(cli);
    let stored: StoredIdentity = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    let secret: [u8; 32] = hex::decode(&stored.secret_key)?
        .try_into()
        .map_err(|_| anyhow::anyhow!("Malformed identity file {:?}", path))?;
    Ok(ChannelIdentity::from_bytes(secret))
}

/// Load `{participant: hex public key}` for all n participants
fn load_directory(path: &PathBuf, n: u16) -> Result<BTreeMap<ParticipantId, [u8; 32]>> {
    let raw: BTreeMap<ParticipantId, String> =
        serde_json::from_str(&std::fs::read_to_string(path)?)?;

    let mut keys = BTreeMap::new();
    for participant in 1..=n {
        let encoded = raw
            .get(&participant)
            .ok_or_else(|| anyhow::anyhow!("Directory missing participant {}", participant))?;
        let key: [u8; 32] = hex::decode(encoded)?
            .try_into()
            .map_err(|_| anyhow::anyhow!("Malformed public key for participant {}", participant))?;
        keys.insert(participant, key);
    }
    Ok(keys)
}

fn load_share(cli: &Cli) -> Result<FinalShare> {
    let path = share_path(cli);
    let final_share: FinalShare = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    Ok(final_share)
}
