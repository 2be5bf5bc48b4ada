//! Sale status command

use anyhow::Result;
use chrono::Utc;
use std::path::Path;

use candy_mint::{transaction::format_amount, WalletSigner};

use super::{connect, load_config, load_wallet, print_error, print_warning, WalletSource};

/// Run the status command
pub async fn run(config_path: &Path, source: &WalletSource) -> Result<()> {
    let config = load_config(config_path)?;
    let wallet = load_wallet(source, Some(&config))?;
    let orchestrator = connect(&config)?;

    println!();
    println!("Connecting to network...");

    let signer: &dyn WalletSigner = &wallet;
    orchestrator.on_wallet_changed(Some(signer)).await;

    let Some(state) = orchestrator.sale_state() else {
        print_error("Could not read the sale program");
        return Ok(());
    };

    println!();
    println!("Sale {}", config.program_id);
    println!("  Price:     {}", format_amount(state.price()));
    println!("  Available: {}", state.items_available());
    println!("  Redeemed:  {}", state.items_redeemed());
    println!("  Remaining: {}", state.items_remaining());
    if let Some(cap) = config.phase_cap {
        println!("  Phase:     {} of {} left", state.remaining_under_cap(cap), cap);
    }
    if let Some(start) = orchestrator.effective_start_time() {
        println!("  Opens:     {}", start.to_rfc2822());
    }

    println!();
    println!("Wallet {}", wallet.address().shorten(4));
    match orchestrator.balance() {
        Some(balance) => println!("  Balance:   {}", format_amount(balance)),
        None => print_warning("Could not read the wallet balance"),
    }

    println!();
    println!("Status: {}", orchestrator.availability(true, Utc::now()));

    Ok(())
}
