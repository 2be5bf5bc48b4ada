//! Candy Machine Minter CLI
//!
//! Mint from a candy machine sale with a local keypair.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "candy-mint")]
#[command(about = "Mint from a candy machine sale")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, default_value = "candy-mint.toml")]
    config: PathBuf,

    /// Keypair file path (overrides the config)
    #[arg(short, long, global = true)]
    keypair: Option<PathBuf>,

    /// Restore the wallet from a mnemonic phrase instead of a keypair file
    #[arg(long, global = true)]
    recover: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show sale state and wallet balance
    Status,

    /// Mint from the sale
    Mint {
        /// Number of items to mint
        #[arg(short, long, default_value = "1")]
        quantity: u32,
    },

    /// Show wallet address
    Address,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let source = commands::WalletSource::from_args(cli.keypair, cli.recover);

    match cli.command {
        Commands::Status => commands::status::run(&cli.config, &source).await,
        Commands::Mint { quantity } => commands::mint::run(&cli.config, &source, quantity).await,
        Commands::Address => commands::address::run(&cli.config, &source).await,
    }
}
