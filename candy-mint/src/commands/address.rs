//! Address display command

use anyhow::Result;
use std::path::Path;

use super::{load_config, load_wallet, WalletSource};

/// Run the address command
pub async fn run(config_path: &Path, source: &WalletSource) -> Result<()> {
    // The config is only needed for its default keypair path
    let config = match source {
        WalletSource::Keyfile(None) => Some(load_config(config_path)?),
        _ => None,
    };

    let wallet = load_wallet(source, config.as_ref())?;
    let address = wallet.address();

    println!();
    println!("Your wallet address:");
    println!();
    println!("  {}", address);
    println!();
    println!("Label: {}", address.shorten(4));

    Ok(())
}
