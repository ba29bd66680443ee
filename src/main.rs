//! Auditchain CLI Application
//!
//! A command-line interface for encoding and decoding wire messages.

use auditchain::cli::{self, CliResult};
use auditchain::config::{parse_magic, WireConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "auditchain")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Wire protocol tools for the audit-mission chain", long_about = None)]
struct Cli {
    /// JSON wire configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Network magic as 8 hex digits (overrides the config file)
    #[arg(short, long)]
    magic: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a framed message given as hex
    Decode {
        /// Message bytes in hex
        hex: String,
    },

    /// Print a framed ping message
    Ping {
        /// Nonce to send (random if omitted)
        #[arg(short, long)]
        nonce: Option<u64>,
    },

    /// Compute the Merkle root of leaf hashes
    MerkleRoot {
        /// Leaf hashes in hex, in block order
        #[arg(required = true)]
        leaves: Vec<String>,
    },

    /// Assemble a demo block from an audit mission
    Assemble {
        /// Block height carried by the audit mission
        #[arg(long)]
        height: u64,

        /// Audit mission script in hex
        #[arg(short, long, default_value = "")]
        script: String,

        /// Number of synthetic transactions to append
        #[arg(short, long, default_value = "0")]
        txs: u32,
    },
}

fn load_config(cli: &Cli) -> CliResult<WireConfig> {
    let mut config = match &cli.config {
        Some(path) => WireConfig::load(path)?,
        None => WireConfig::default(),
    };
    if let Some(magic) = &cli.magic {
        config = config.with_magic(parse_magic(magic)?);
    }
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    log::debug!("Using network magic {}", hex::encode(config.magic));

    match cli.command {
        Commands::Decode { hex } => cli::cmd_decode(&config, &hex)?,
        Commands::Ping { nonce } => cli::cmd_ping(&config, nonce)?,
        Commands::MerkleRoot { leaves } => cli::cmd_merkle_root(&leaves)?,
        Commands::Assemble {
            height,
            script,
            txs,
        } => cli::cmd_assemble(&config, height, &script, txs)?,
    }

    Ok(())
}
