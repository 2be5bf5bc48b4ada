//! Mint command

use anyhow::{anyhow, Result};
use std::path::Path;
use tracing::info;

use candy_mint::{
    balance::BalanceSettle, transaction::format_amount, MintReport, TransactionOutcome,
    WalletSigner,
};

use super::{connect, load_config, load_wallet, print_alert, print_warning, WalletSource};

/// Run the mint command
pub async fn run(config_path: &Path, source: &WalletSource, quantity: u32) -> Result<()> {
    if quantity == 0 {
        return Err(anyhow!("Quantity must be at least 1"));
    }

    let config = load_config(config_path)?;
    let wallet = load_wallet(source, Some(&config))?;
    let orchestrator = connect(&config)?;

    let signer: &dyn WalletSigner = &wallet;
    orchestrator.on_wallet_changed(Some(signer)).await;

    if let Some(balance) = orchestrator.balance() {
        println!("Balance: {}", format_amount(balance));
    }
    println!();
    println!("Minting {} from {}...", quantity, config.program_id);

    // Ctrl-C abandons the confirmation and balance waits
    let cancel = orchestrator.cancellation_token();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted; no longer waiting for confirmations");
            cancel.cancel();
        }
    });

    let report = orchestrator.mint(Some(signer), quantity).await;
    watcher.abort();

    println!();
    print_alert(&orchestrator.alert());

    match report {
        Some(MintReport::Single(TransactionOutcome::TimedOut)) => {
            print_warning("The transaction may still land; check your wallet before minting again.");
        }
        Some(MintReport::Batch(report)) => {
            if let Some(BalanceSettle::TimedOut { .. }) = report.balance {
                print_warning("Wallet balance has not caught up yet; it may still change.");
            }
        }
        _ => {}
    }

    if let Some(balance) = orchestrator.balance() {
        println!("Balance: {}", format_amount(balance));
    }
    if let Some(state) = orchestrator.sale_state() {
        println!("Remaining: {}", state.items_remaining());
    }

    Ok(())
}
