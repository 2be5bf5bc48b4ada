//! Mint Orchestrator
//!
//! Drives a wallet and a ledger connection through single and batch mints:
//!
//! 1. Preflight: short-circuit on a known sold-out sale or a sale that has
//!    not started, without touching the network
//! 2. Build and sign one or N independent mint transactions
//! 3. Submit and poll every transaction concurrently until each one is
//!    terminal (join, not race)
//! 4. Aggregate the outcomes and, for batches, wait for the wallet balance
//!    to catch up with the spend
//! 5. Publish a single alert, then refresh the balance and sale snapshot
//!
//! Every mint attempt goes `Idle -> Submitted -> terminal -> Idle`; nothing
//! is retried automatically.
//!
//! Cancellation is checked before signing and before every submission, and
//! every network call races the token. Once the orchestrator is shut down no
//! further transaction is sent.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::address::Address;
use crate::alert::{Alert, AlertSlot};
use crate::balance::{wait_for_balance_settle, BalanceSettle};
use crate::capability::{LedgerConnection, SaleProgramReader, WalletSigner};
use crate::confirmation::{poll_transaction_confirmation, PollPolicy, TransactionOutcome};
use crate::error::{ConnectionError, ErrorKind, MintError, MintResult, ProgramError};
use crate::sale::{Countdown, MintAvailability, SaleState};
use crate::transaction::{MintTransactionBuilder, SignedTransaction};

/// Everything the orchestrator needs to know about the sale it drives
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Sale program (candy machine) id
    pub program_id: Address,
    /// Sale config account
    pub config: Address,
    /// Receives mint payments
    pub treasury: Address,
    /// Overrides the program's go-live date
    pub start_time_override: Option<DateTime<Utc>>,
    /// Confirmation window per transaction
    pub tx_timeout: Duration,
    pub poll_policy: PollPolicy,
    pub balance_poll_interval: Duration,
    pub balance_settle_timeout: Duration,
    /// Estimated lamports spent per mint; the sale price when unset
    pub estimated_cost_per_item: Option<u64>,
}

impl OrchestratorSettings {
    /// Settings with default timing
    pub fn new(program_id: Address, config: Address, treasury: Address) -> Self {
        Self {
            program_id,
            config,
            treasury,
            start_time_override: None,
            tx_timeout: Duration::from_secs(30),
            poll_policy: PollPolicy::default(),
            balance_poll_interval: Duration::from_secs(1),
            balance_settle_timeout: Duration::from_secs(60),
            estimated_cost_per_item: None,
        }
    }
}

/// Aggregate of a batch. `success_count + failure_count` is the batch size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub success_count: u32,
    pub failure_count: u32,
}

impl BatchResult {
    /// Confirmed outcomes are successes; everything else is a failure
    pub fn from_outcomes(outcomes: &[TransactionOutcome]) -> Self {
        outcomes
            .iter()
            .fold(BatchResult::default(), |mut result, outcome| {
                if outcome.is_confirmed() {
                    result.success_count += 1;
                } else {
                    result.failure_count += 1;
                }
                result
            })
    }

    pub fn total(&self) -> u32 {
        self.success_count + self.failure_count
    }
}

/// Result of a batch mint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub result: BatchResult,
    /// Outcome per transaction, in build order
    pub outcomes: Vec<TransactionOutcome>,
    /// `None` when nothing confirmed and the settle wait was skipped
    pub balance: Option<BalanceSettle>,
}

/// What a call to [`MintOrchestrator::mint`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MintReport {
    Single(TransactionOutcome),
    Batch(BatchReport),
    /// Attempt failed before any outcome was produced
    Failed(ErrorKind),
}

/// Drives mints against one sale program
pub struct MintOrchestrator<C, R> {
    connection: Arc<C>,
    reader: Arc<R>,
    settings: OrchestratorSettings,
    sale_state: watch::Sender<Option<SaleState>>,
    balance: watch::Sender<Option<u64>>,
    alerts: AlertSlot,
    sold_out: AtomicBool,
    minting: AtomicBool,
    cancel: CancellationToken,
}

impl<C, R> MintOrchestrator<C, R>
where
    C: LedgerConnection,
    R: SaleProgramReader,
{
    pub fn new(connection: Arc<C>, reader: Arc<R>, settings: OrchestratorSettings) -> Self {
        let (sale_state, _) = watch::channel(None);
        let (balance, _) = watch::channel(None);

        Self {
            connection,
            reader,
            settings,
            sale_state,
            balance,
            alerts: AlertSlot::new(),
            sold_out: AtomicBool::new(false),
            minting: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Latest sale snapshot
    pub fn sale_state(&self) -> Option<SaleState> {
        self.sale_state.borrow().clone()
    }

    pub fn subscribe_sale_state(&self) -> watch::Receiver<Option<SaleState>> {
        self.sale_state.subscribe()
    }

    /// Last observed wallet balance in lamports
    pub fn balance(&self) -> Option<u64> {
        *self.balance.borrow()
    }

    pub fn subscribe_balance(&self) -> watch::Receiver<Option<u64>> {
        self.balance.subscribe()
    }

    pub fn alert(&self) -> Alert {
        self.alerts.current()
    }

    pub fn subscribe_alerts(&self) -> watch::Receiver<Alert> {
        self.alerts.subscribe()
    }

    pub fn dismiss_alert(&self) {
        self.alerts.dismiss();
    }

    pub fn is_sold_out(&self) -> bool {
        self.sold_out.load(Ordering::SeqCst)
    }

    pub fn is_minting(&self) -> bool {
        self.minting.load(Ordering::SeqCst)
    }

    /// Token cancelled by [`shutdown`](Self::shutdown); in-flight waits
    /// observe it at every suspend point
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Abandon every in-flight call and wait. Permanent: later mints fail
    /// with [`MintError::Cancelled`] before submitting anything.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// The configured override, else the program's go-live date
    pub fn effective_start_time(&self) -> Option<DateTime<Utc>> {
        self.settings
            .start_time_override
            .or_else(|| self.sale_state.borrow().as_ref().map(|s| s.start_time()))
    }

    /// State of the mint controls at `now`
    pub fn availability(&self, wallet_connected: bool, now: DateTime<Utc>) -> MintAvailability {
        if !wallet_connected {
            return MintAvailability::Disconnected;
        }
        if self.is_sold_out() {
            return MintAvailability::SoldOut;
        }
        if let Some(countdown) = self
            .effective_start_time()
            .and_then(|start| Countdown::until(start, now))
        {
            return MintAvailability::NotLive(countdown);
        }
        if self.is_minting() {
            return MintAvailability::Minting;
        }
        MintAvailability::Ready
    }

    /// Re-read the sale program and replace the snapshot
    pub async fn refresh_sale_state(&self) -> MintResult<SaleState> {
        let state = self
            .cancellable(self.reader.load(&self.settings.program_id))
            .await?;

        if state.is_sold_out() {
            self.mark_sold_out();
        }
        debug!(
            "Sale state: {} available, {} redeemed, {} remaining",
            state.items_available(),
            state.items_redeemed(),
            state.items_remaining()
        );

        self.sale_state.send_replace(Some(state.clone()));
        Ok(state)
    }

    /// Re-read the wallet balance
    pub async fn refresh_balance(&self, wallet: &dyn WalletSigner) -> MintResult<u64> {
        let balance = self
            .cancellable(self.connection.get_balance(&wallet.public_address()))
            .await?;
        self.balance.send_replace(Some(balance));
        Ok(balance)
    }

    /// Refresh everything that depends on the wallet or connection
    pub async fn on_wallet_changed(&self, wallet: Option<&dyn WalletSigner>) {
        match wallet {
            Some(wallet) => {
                if let Err(e) = self.refresh_balance(wallet).await {
                    warn!("Failed to refresh balance: {}", e);
                }
                if let Err(e) = self.refresh_sale_state().await {
                    warn!("Failed to refresh sale state: {}", e);
                }
            }
            None => {
                self.balance.send_replace(None);
            }
        }
    }

    /// Mint `quantity` items and publish the result to the alert slot.
    ///
    /// A missing wallet or a mint already in flight makes this a no-op that
    /// returns `None` without touching the network or the alert slot.
    pub async fn mint(
        &self,
        wallet: Option<&dyn WalletSigner>,
        quantity: u32,
    ) -> Option<MintReport> {
        let Some(wallet) = wallet else {
            debug!("Mint ignored: no wallet connected");
            return None;
        };

        let Some(_guard) = MintingGuard::acquire(&self.minting) else {
            debug!("Mint ignored: another mint is in flight");
            return None;
        };

        // Shut down, known sold out or not live yet: no network traffic at all
        if let Err(e) = self.preflight(Utc::now()) {
            return Some(MintReport::Failed(self.report_error(&e)));
        }

        let report = if quantity == 1 {
            match self.submit_single(wallet).await {
                Ok(outcome) => {
                    self.alerts.show(self.single_outcome_alert(&outcome));
                    MintReport::Single(outcome)
                }
                Err(e) => MintReport::Failed(self.report_error(&e)),
            }
        } else {
            match self.submit_batch(wallet, quantity).await {
                Ok(report) => {
                    self.alerts.show(batch_alert(&report.result));
                    MintReport::Batch(report)
                }
                Err(e) => MintReport::Failed(self.report_error(&e)),
            }
        };

        if !self.cancel.is_cancelled() {
            if let Err(e) = self.refresh_balance(wallet).await {
                warn!("Failed to refresh balance: {}", e);
            }
            if let Err(e) = self.refresh_sale_state().await {
                warn!("Failed to refresh sale state: {}", e);
            }
        }

        Some(report)
    }

    /// Submit one mint transaction and wait for its terminal outcome
    pub async fn submit_single(&self, wallet: &dyn WalletSigner) -> MintResult<TransactionOutcome> {
        self.preflight(Utc::now())?;

        let state = match self.sale_state() {
            Some(state) => state,
            None => self.refresh_sale_state().await?,
        };
        self.preflight(Utc::now())?;

        let builder = self.transaction_builder(wallet, &state);
        let signed = self
            .cancellable(wallet.sign_transaction(builder.build()))
            .await?;

        let signature = self.cancellable(self.connection.submit(&signed)).await?;
        info!("Submitted mint transaction {}", signature);

        let outcome = poll_transaction_confirmation(
            &signature,
            self.settings.tx_timeout,
            self.connection.as_ref(),
            &self.settings.poll_policy,
            &self.cancel,
        )
        .await;

        if let TransactionOutcome::Failed(err) = &outcome {
            self.note_program_error(err);
        }
        Ok(outcome)
    }

    /// Submit `quantity` independent mint transactions, wait for all of them
    /// and for the wallet balance to reflect the spend.
    ///
    /// One transaction failing never aborts the others.
    pub async fn submit_batch(
        &self,
        wallet: &dyn WalletSigner,
        quantity: u32,
    ) -> MintResult<BatchReport> {
        if quantity == 0 {
            return Err(MintError::InvalidQuantity);
        }
        self.preflight(Utc::now())?;

        let state = self.refresh_sale_state().await?;
        self.preflight(Utc::now())?;

        let payer = wallet.public_address();
        let starting_balance = self
            .cancellable(self.connection.get_balance(&payer))
            .await?;
        let cost_per_item = self
            .settings
            .estimated_cost_per_item
            .unwrap_or_else(|| state.price());
        let threshold =
            starting_balance.saturating_sub(cost_per_item.saturating_mul(u64::from(quantity)));

        let builder = self.transaction_builder(wallet, &state);
        let signed = self
            .cancellable(wallet.sign_all_transactions(builder.build_batch(quantity)))
            .await?;
        info!("Submitting batch of {} mint transactions", signed.len());

        let outcomes: Vec<TransactionOutcome> =
            join_all(signed.iter().map(|tx| self.submit_and_confirm(tx))).await;

        for outcome in &outcomes {
            if let TransactionOutcome::Failed(err) = outcome {
                self.note_program_error(err);
            }
        }

        let result = BatchResult::from_outcomes(&outcomes);
        info!(
            "Batch finished: {} succeeded, {} failed",
            result.success_count, result.failure_count
        );

        let balance = if result.success_count > 0 {
            let settle = wait_for_balance_settle(
                self.connection.as_ref(),
                &payer,
                threshold,
                self.settings.balance_poll_interval,
                self.settings.balance_settle_timeout,
                &self.cancel,
            )
            .await;

            if !settle.is_settled() {
                warn!("Wallet balance has not caught up with the batch; reporting anyway");
            }
            if let Some(balance) = settle.last_balance() {
                self.balance.send_replace(Some(balance));
            }
            Some(settle)
        } else {
            None
        };

        Ok(BatchReport {
            result,
            outcomes,
            balance,
        })
    }

    /// Submit then poll one transaction of a batch. Submission errors become
    /// failed outcomes instead of aborting the batch.
    async fn submit_and_confirm(&self, tx: &SignedTransaction) -> TransactionOutcome {
        let submitted = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!("Mint transaction not submitted: cancelled");
                return TransactionOutcome::Cancelled;
            }
            submitted = self.connection.submit(tx) => submitted,
        };

        let signature = match submitted {
            Ok(signature) => signature,
            Err(ConnectionError::Rejected(err)) => {
                debug!("Mint transaction rejected: {}", err);
                return TransactionOutcome::Failed(err);
            }
            Err(e) => {
                debug!("Mint transaction submission failed: {}", e);
                return TransactionOutcome::Failed(ProgramError::new(None, e.to_string()));
            }
        };

        poll_transaction_confirmation(
            &signature,
            self.settings.tx_timeout,
            self.connection.as_ref(),
            &self.settings.poll_policy,
            &self.cancel,
        )
        .await
    }

    fn transaction_builder(
        &self,
        wallet: &dyn WalletSigner,
        state: &SaleState,
    ) -> MintTransactionBuilder {
        MintTransactionBuilder::new(
            self.settings.program_id,
            self.settings.config,
            wallet.public_address(),
            self.settings.treasury,
            state.price(),
        )
    }

    /// Checks that need no network call. The start-time gate is the same
    /// countdown [`availability`](Self::availability) shows.
    fn preflight(&self, now: DateTime<Utc>) -> MintResult<()> {
        if self.cancel.is_cancelled() {
            return Err(MintError::Cancelled);
        }
        if self.is_sold_out() {
            return Err(MintError::SoldOut);
        }
        if let Some(start) = self.effective_start_time() {
            if Countdown::until(start, now).is_some() {
                return Err(MintError::SaleNotLive(start));
            }
        }
        Ok(())
    }

    /// Run a network or wallet call unless the token fires first
    async fn cancellable<T, E>(&self, call: impl Future<Output = Result<T, E>>) -> MintResult<T>
    where
        MintError: From<E>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(MintError::Cancelled),
            result = call => result.map_err(MintError::from),
        }
    }

    fn mark_sold_out(&self) {
        if !self.sold_out.swap(true, Ordering::SeqCst) {
            info!("Sale is sold out");
        }
    }

    fn note_program_error(&self, err: &ProgramError) {
        if err.kind() == ErrorKind::SoldOut {
            self.mark_sold_out();
        }
    }

    fn single_outcome_alert(&self, outcome: &TransactionOutcome) -> Alert {
        match outcome {
            TransactionOutcome::Confirmed => Alert::success("Congratulations! Mint succeeded!"),
            TransactionOutcome::Failed(err) => Alert::error(err.kind().user_message()),
            TransactionOutcome::TimedOut => {
                Alert::error(ErrorKind::TransactionTimeout.user_message())
            }
            TransactionOutcome::Cancelled => {
                Alert::warning("Stopped waiting for the mint to confirm. Check your wallet.")
            }
        }
    }

    /// Convert an error into the alert slot
    fn report_error(&self, err: &MintError) -> ErrorKind {
        let kind = err.kind();
        if let MintError::Cancelled = err {
            info!("{}", err);
            self.alerts.show(Alert::warning("Mint cancelled. Nothing was submitted."));
            return kind;
        }
        if kind == ErrorKind::SoldOut {
            self.mark_sold_out();
        }

        warn!("Mint failed: {}", err);
        self.alerts.show(Alert::error(kind.user_message()));
        kind
    }
}

/// Holds the in-flight flag; cleared on drop so an abandoned `mint` future
/// does not leave the controls stuck in `Minting`
struct MintingGuard<'a>(&'a AtomicBool);

impl<'a> MintingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| MintingGuard(flag))
    }
}

impl Drop for MintingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn batch_alert(result: &BatchResult) -> Alert {
    match (result.success_count, result.failure_count) {
        (succeeded, 0) => Alert::success(format!(
            "Congratulations! {} mints succeeded!",
            succeeded
        )),
        (0, failed) => Alert::error(format!("All {} mints failed! Check your wallet.", failed)),
        (succeeded, failed) => Alert::warning(format!(
            "{} mints succeeded, {} mints failed! Check your wallet.",
            succeeded, failed
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::Severity;

    #[test]
    fn test_batch_result_counts_every_outcome() {
        let outcomes = vec![
            TransactionOutcome::Confirmed,
            TransactionOutcome::Failed(ProgramError::with_code(0x137)),
            TransactionOutcome::TimedOut,
            TransactionOutcome::Cancelled,
            TransactionOutcome::Confirmed,
        ];

        let result = BatchResult::from_outcomes(&outcomes);
        assert_eq!(result.success_count, 2);
        assert_eq!(result.failure_count, 3);
        assert_eq!(result.total() as usize, outcomes.len());
    }

    #[test]
    fn test_minting_guard_clears_on_drop() {
        let flag = AtomicBool::new(false);

        let guard = MintingGuard::acquire(&flag).unwrap();
        assert!(flag.load(Ordering::SeqCst));
        assert!(MintingGuard::acquire(&flag).is_none());

        drop(guard);
        assert!(!flag.load(Ordering::SeqCst));
        assert!(MintingGuard::acquire(&flag).is_some());
    }

    #[test]
    fn test_batch_alert_severity() {
        let all = batch_alert(&BatchResult {
            success_count: 5,
            failure_count: 0,
        });
        assert_eq!(all.severity, Severity::Success);
        assert_eq!(all.message, "Congratulations! 5 mints succeeded!");

        let mixed = batch_alert(&BatchResult {
            success_count: 3,
            failure_count: 2,
        });
        assert_eq!(mixed.severity, Severity::Warning);
        assert!(mixed.message.contains('3') && mixed.message.contains('2'));

        let none = batch_alert(&BatchResult {
            success_count: 0,
            failure_count: 5,
        });
        assert_eq!(none.severity, Severity::Error);
    }
}
