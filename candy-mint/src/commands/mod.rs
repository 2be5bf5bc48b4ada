//! CLI Commands
//!
//! Implementation of all minter CLI commands.

pub mod address;
pub mod mint;
pub mod status;

use anyhow::{anyhow, Context, Result};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zeroize::Zeroizing;

use candy_mint::{Alert, KeypairWallet, MintConfig, MintOrchestrator, RpcPool, Severity};

/// Where the wallet comes from
pub enum WalletSource {
    /// Keypair file; the config's path when `None`
    Keyfile(Option<PathBuf>),
    /// Prompt for a BIP39 phrase
    Mnemonic,
}

impl WalletSource {
    pub fn from_args(keypair: Option<PathBuf>, recover: bool) -> Self {
        if recover {
            WalletSource::Mnemonic
        } else {
            WalletSource::Keyfile(keypair)
        }
    }
}

/// Prompt for password input (hidden)
pub fn prompt_password(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let password = rpassword::read_password()?;
    Ok(password)
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("\x1b[31mError:\x1b[0m {}", message);
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("\x1b[32m{}\x1b[0m", message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("\x1b[33mWarning:\x1b[0m {}", message);
}

/// Print the alert slot, if anything is showing
pub fn print_alert(alert: &Alert) {
    if !alert.visible {
        return;
    }
    match alert.severity {
        Severity::Success => print_success(&alert.message),
        Severity::Warning => print_warning(&alert.message),
        Severity::Error => print_error(&alert.message),
        Severity::Info | Severity::None => println!("{}", alert.message),
    }
}

pub fn load_config(path: &Path) -> Result<MintConfig> {
    MintConfig::from_file(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Load the wallet from a keypair file or a mnemonic
pub fn load_wallet(source: &WalletSource, config: Option<&MintConfig>) -> Result<KeypairWallet> {
    match source {
        WalletSource::Mnemonic => {
            let phrase = Zeroizing::new(prompt_password("Enter recovery phrase: ")?);
            Ok(KeypairWallet::from_mnemonic(&phrase)?)
        }
        WalletSource::Keyfile(path) => {
            let path = path
                .clone()
                .or_else(|| config.and_then(MintConfig::keypair_path))
                .ok_or_else(|| anyhow!("No keypair path configured"))?;

            KeypairWallet::load(&path)
                .with_context(|| format!("Failed to load keypair from {}", path.display()))
        }
    }
}

/// Connect to the configured endpoints
pub fn connect(config: &MintConfig) -> Result<MintOrchestrator<RpcPool, RpcPool>> {
    let pool = Arc::new(RpcPool::new(&config.rpc_endpoints, config.request_timeout())?);
    let settings = config.orchestrator_settings()?;

    Ok(MintOrchestrator::new(pool.clone(), pool, settings))
}
