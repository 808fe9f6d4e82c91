//! Keychain CLI
//!
//! Command-line interface for the threshold key lifecycle:
//! - generation and recovery ceremonies
//! - address derivation
//! - threshold signing and group-secret export

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};

use keychain_core::service::{
    self, AddressRequest, ExportSecretRequest, GenerateRequest, RecoverRequest, SignRequest,
};
use keychain_core::{EngineKind, KeyShare, SessionMode};

/// Keychain - threshold key lifecycle driver
#[derive(Parser)]
#[command(name = "keychain")]
#[command(about = "Threshold ECDSA/EdDSA key lifecycle operations")]
#[command(version)]
struct Cli {
    /// Session mode: interactive or local
    #[arg(short, long, env = "MODE", default_value = "local")]
    mode: SessionMode,

    /// Data directory for key shares
    #[arg(short, long, env = "DEST", default_value = "./data")]
    dest: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a key generation ceremony
    Generate {
        /// Quorum size (t-of-n)
        #[arg(short, long)]
        t: Option<u16>,

        /// Number of shares to issue
        #[arg(short, long)]
        n: Option<u16>,

        /// Signature engine: ECDSA or EDDSA
        #[arg(short, long)]
        engine: Option<EngineKind>,
    },

    /// Rebuild the shares missing from a presented set
    Recover {
        /// Share indices to present (comma-separated)
        #[arg(short, long)]
        keys: String,

        /// Ceremony metadata blob, required in interactive mode
        #[arg(short, long)]
        aux: Option<String>,
    },

    /// Derive the account address for a share
    Address {
        /// Share index
        #[arg(short, long)]
        key: u32,

        /// Chain selector (evm or ton), defaulting to the engine's form
        #[arg(short, long)]
        chain: Option<String>,
    },

    /// Sign a message with a quorum of shares
    Sign {
        /// Message payload, 0x-hex or plain text
        #[arg(short, long)]
        message: String,

        /// Share indices participating (comma-separated)
        #[arg(short, long)]
        keys: String,

        /// Treat the message as personal text instead of a transaction
        #[arg(long)]
        personal: bool,

        /// Session quorum
        #[arg(short, long)]
        t: Option<u16>,
    },

    /// Reconstruct and print the group secret
    Export {
        /// Share indices to present (comma-separated)
        #[arg(short, long)]
        keys: String,
    },

    /// Show key share info
    Info {
        /// Share index
        #[arg(short, long)]
        key: u32,
    },
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

    keychain_mpc::install();

    match cli.command {
        Commands::Generate { t, n, engine } => {
            run_generate(&cli, t, n, engine).await?;
        }
        Commands::Recover { ref keys, ref aux } => {
            run_recover(&cli, keys, aux.clone()).await?;
        }
        Commands::Address { key, ref chain } => {
            run_address(&cli, key, chain.clone()).await?;
        }
        Commands::Sign {
            ref message,
            ref keys,
            personal,
            t,
        } => {
            run_sign(&cli, message, keys, personal, t).await?;
        }
        Commands::Export { ref keys } => {
            run_export(&cli, keys).await?;
        }
        Commands::Info { key } => {
            show_info(&cli, key)?;
        }
    }

    Ok(())
}

async fn run_generate(
    cli: &Cli,
    t: Option<u16>,
    n: Option<u16>,
    engine: Option<EngineKind>,
) -> Result<()> {
    info!(mode = %cli.mode, "Starting generation ceremony");

    let req = GenerateRequest { t, n, engine };
    let shares = match cli.mode {
        SessionMode::Interactive => service::generate(req).await?,
        SessionMode::LocalSimulation => service::generate_local(req).await?,
    };

    for share in &shares {
        save_share(cli, share)?;
    }
    let first = shares
        .first()
        .ok_or_else(|| anyhow!("ceremony produced no shares"))?;

    info!(
        public_key = hex::encode(&first.public_key),
        shares = shares.len(),
        "Generation completed, key shares saved"
    );

    println!("Public Key: 0x{}", hex::encode(&first.public_key));
    println!("Shares: {}", shares.len());

    Ok(())
}

async fn run_recover(cli: &Cli, keys: &str, aux: Option<String>) -> Result<()> {
    let shares = load_shares(cli, keys)?;
    let engine = shares.first().map(|s| s.engine);

    info!(mode = %cli.mode, presented = shares.len(), "Starting recovery");

    let req = RecoverRequest {
        keys: Some(shares),
        aux,
        engine,
    };
    let recovered = match cli.mode {
        SessionMode::Interactive => service::recover(req).await?,
        SessionMode::LocalSimulation => service::recover_local(req).await?,
    };

    if recovered.is_empty() {
        println!("Share set already complete");
        return Ok(());
    }
    for share in &recovered {
        save_share(cli, share)?;
        println!("Recovered share {}", share.index);
    }

    Ok(())
}

async fn run_address(cli: &Cli, key: u32, chain: Option<String>) -> Result<()> {
    let share = load_share(cli, key)?;

    let req = AddressRequest {
        key: Some(share),
        chain,
        engine: None,
    };
    let address = match cli.mode {
        SessionMode::Interactive => service::address(req).await?,
        SessionMode::LocalSimulation => service::address_local(req).await?,
    };

    println!("Address: {}", address);

    Ok(())
}

async fn run_sign(
    cli: &Cli,
    message: &str,
    keys: &str,
    personal: bool,
    t: Option<u16>,
) -> Result<()> {
    let shares = load_shares(cli, keys)?;
    let engine = shares.first().map(|s| s.engine);

    info!(
        mode = %cli.mode,
        signers = shares.len(),
        "Starting signing session"
    );

    let req = SignRequest {
        message: Some(message.to_string()),
        keys: Some(shares),
        engine,
        is_transaction: Some(!personal),
        t,
    };
    let signature = match cli.mode {
        SessionMode::Interactive => service::sign(req).await?,
        SessionMode::LocalSimulation => service::sign_local(req).await?,
    };

    info!("Signature generated");
    println!("Signature: {}", signature);

    Ok(())
}

async fn run_export(cli: &Cli, keys: &str) -> Result<()> {
    let shares = load_shares(cli, keys)?;
    let engine = shares.first().map(|s| s.engine);

    let req = ExportSecretRequest {
        keys: Some(shares),
        engine,
    };
    let secret = match cli.mode {
        SessionMode::Interactive => service::export_secret(req).await?,
        SessionMode::LocalSimulation => service::export_secret_local(req).await?,
    };

    println!("Secret: {}", secret);

    Ok(())
}

fn show_info(cli: &Cli, key: u32) -> Result<()> {
    let share = load_share(cli, key)?;

    println!("Key Share Info:");
    println!("  Index: {}", share.index);
    println!("  Engine: {}", share.engine);
    println!("  Quorum: {} of {}", share.params.t, share.params.n);
    println!("  Public Key: 0x{}", hex::encode(&share.public_key));

    Ok(())
}

fn share_path(cli: &Cli, index: u32) -> PathBuf {
    cli.dest.join(format!("keyshare.{}.json", index))
}

fn save_share(cli: &Cli, share: &KeyShare) -> Result<()> {
    let path = share_path(cli, share.index);
    let json = serde_json::to_string_pretty(share)?;
    std::fs::write(&path, json)?;
    info!(index = share.index, path = ?path, "Key share saved");
    Ok(())
}

fn load_share(cli: &Cli, index: u32) -> Result<KeyShare> {
    let path = share_path(cli, index);
    let json = std::fs::read_to_string(&path)
        .map_err(|e| anyhow!("cannot read share {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&json)?)
}

fn load_shares(cli: &Cli, indices: &str) -> Result<Vec<KeyShare>> {
    indices
        .split(',')
        .map(|part| {
            let index: u32 = part
                .trim()
                .parse()
                .map_err(|e| anyhow!("invalid share index '{}': {}", part.trim(), e))?;
            load_share(cli, index)
        })
        .collect()
}
