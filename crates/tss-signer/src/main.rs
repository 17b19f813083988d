//! TSS Signer CLI
//!
//! Command-line interface for threshold signing of wallet transaction
//! proposals:
//! - initiate a signing session for a proposal
//! - join a session another co-signer initiated
//! - inspect key eligibility

use anyhow::Result;
use clap::{Parser, Subcommand};
use sign_relay_client::HttpSessionClient;
use std::path::PathBuf;
use tracing::{info, Level};
use tss_core::types::{CopayerSignStatus, RoundPhase, SigningProgress, SigningStatus};
use tss_core::{
    derive_session_id, Coordinator, SignOptions, SigningObserver, ThresholdKey,
    TransactionProposal, Wallet, DEFAULT_TIMEOUT,
};

/// TSS Signer - threshold signing client
#[derive(Parser)]
#[command(name = "tss-signer")]
#[command(about = "Threshold signing client for wallet transaction proposals")]
#[command(version)]
struct Cli {
    /// Wallet coordination service URL
    #[arg(short, long, env = "WCS_URL", default_value = "http://127.0.0.1:3232")]
    url: String,

    /// Path to the threshold key JSON file
    #[arg(short, long, env = "TSS_KEY")]
    key: PathBuf,

    /// Path to the wallet JSON file
    #[arg(short, long, env = "TSS_WALLET")]
    wallet: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initiate a signing session for a transaction proposal
    Sign {
        /// Path to the transaction proposal JSON file
        #[arg(short, long)]
        txp: PathBuf,

        /// Session timeout in seconds
        #[arg(long, default_value = "300")]
        timeout: u64,
    },

    /// Join a signing session another co-signer initiated
    Join {
        /// Path to the transaction proposal JSON file
        #[arg(short, long)]
        txp: PathBuf,
    },

    /// Show key eligibility info
    Info,
}

/// Forwards session progress to the log
struct LogObserver;

impl SigningObserver for LogObserver {
    fn on_status_change(&self, status: SigningStatus) {
        info!(?status, "Status changed");
    }

    fn on_progress_update(&self, progress: SigningProgress) {
        info!(
            round = progress.current_round,
            total = progress.total_rounds,
            "Progress"
        );
    }

    fn on_copayer_status_change(&self, copayer_id: &str, status: CopayerSignStatus) {
        info!(copayer_id, ?status, "Copayer update");
    }

    fn on_round_update(&self, round: u32, phase: RoundPhase) {
        info!(round, ?phase, "Round update");
    }

    fn on_complete(&self, signature: &str) {
        info!(signature, "Signature obtained");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let key: ThresholdKey = load_json(&cli.key)?;
    let wallet: Wallet = load_json(&cli.wallet)?;

    match cli.command {
        Commands::Sign { ref txp, timeout } => {
            let txp: TransactionProposal = load_json(txp)?;
            let opts = SignOptions {
                timeout: std::time::Duration::from_secs(timeout),
                as_joiner: false,
            };
            run_session(&cli, &key, &wallet, &txp, opts).await?;
        }
        Commands::Join { ref txp } => {
            let txp: TransactionProposal = load_json(txp)?;
            let opts = SignOptions {
                timeout: DEFAULT_TIMEOUT,
                as_joiner: true,
            };
            run_session(&cli, &key, &wallet, &txp, opts).await?;
        }
        Commands::Info => {
            show_info(&key, &wallet);
        }
    }

    Ok(())
}

async fn run_session(
    cli: &Cli,
    key: &ThresholdKey,
    wallet: &Wallet,
    txp: &TransactionProposal,
    opts: SignOptions,
) -> Result<()> {
    let session_id = derive_session_id(txp);
    info!(
        session_id = %session_id,
        txp_id = %txp.id,
        chain = %txp.chain,
        as_joiner = opts.as_joiner,
        "Starting signing session"
    );

    let client = HttpSessionClient::new(&cli.url, &session_id);
    let push_client = HttpSessionClient::new(&cli.url, &session_id);
    let coordinator = Coordinator::new(client, push_client);

    let signed = coordinator.sign(key, wallet, txp, &LogObserver, opts).await?;

    println!("Proposal: {}", signed.id);
    if let Some(status) = &signed.status {
        println!("Status:   {}", status);
    }
    for signature in &signed.signatures {
        println!("Signature: {}", signature);
    }

    Ok(())
}

fn show_info(key: &ThresholdKey, wallet: &Wallet) {
    println!("Threshold Key Info:");
    println!("  Key ID:        {}", key.id);
    println!("  Total parties: {}", key.total_parties);
    println!("  Eligible:      {}", key.is_threshold_eligible());
    println!(
        "  Wallet link:   {}",
        wallet.threshold_key_id.as_deref().unwrap_or("(none)")
    );
}

fn load_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}
