//! Transaction Confirmation Polling
//!
//! Polls the ledger for the status of a submitted transaction until it
//! reaches a terminal status, the timeout window closes, or the wait is
//! cancelled. Many signatures may be polled concurrently on one connection.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::address::Signature;
use crate::capability::{LedgerConnection, TransactionStatus};
use crate::error::ProgramError;

/// Terminal outcome of one submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
    Confirmed,
    /// Landed with an on-chain error
    Failed(ProgramError),
    /// No terminal status observed inside the timeout window. The
    /// transaction may still land later.
    TimedOut,
    /// Abandoned by the caller before a terminal status was observed
    Cancelled,
}

impl TransactionOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, TransactionOutcome::Confirmed)
    }
}

/// Spacing between status queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    /// Interval multiplier after each pending status
    pub backoff_factor: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(2),
            backoff_factor: 2,
        }
    }
}

impl PollPolicy {
    /// Constant interval, no backoff
    pub fn fixed(interval: Duration) -> Self {
        Self {
            initial_interval: interval,
            max_interval: interval,
            backoff_factor: 1,
        }
    }

    /// Interval to use after `current`
    pub fn next_interval(&self, current: Duration) -> Duration {
        current
            .saturating_mul(self.backoff_factor.max(1))
            .min(self.max_interval)
    }
}

/// Wait for `signature` to reach a terminal status.
///
/// Returns [`TransactionOutcome::TimedOut`] when nothing terminal is observed
/// within `timeout`; the wait never overruns the window by more than one poll
/// interval. Query errors are treated as transient.
pub async fn poll_transaction_confirmation<C>(
    signature: &Signature,
    timeout: Duration,
    connection: &C,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> TransactionOutcome
where
    C: LedgerConnection + ?Sized,
{
    let deadline = Instant::now() + timeout;
    let mut interval = policy.initial_interval;

    loop {
        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Stopped waiting for {}: cancelled", signature);
                return TransactionOutcome::Cancelled;
            }
            status = tokio::time::timeout_at(deadline, connection.get_status(signature)) => status,
        };

        match status {
            Ok(Ok(TransactionStatus::Confirmed)) => {
                debug!("Transaction {} confirmed", signature);
                return TransactionOutcome::Confirmed;
            }
            Ok(Ok(TransactionStatus::Errored(err))) => {
                debug!("Transaction {} failed: {}", signature, err);
                return TransactionOutcome::Failed(err);
            }
            Ok(Ok(TransactionStatus::Pending)) => {
                trace!("Transaction {} pending", signature);
            }
            Ok(Err(e)) => {
                debug!("Status query for {} failed: {}", signature, e);
            }
            Err(_) => break,
        }

        let now = Instant::now();
        if now >= deadline {
            break;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Stopped waiting for {}: cancelled", signature);
                return TransactionOutcome::Cancelled;
            }
            _ = tokio::time::sleep(interval.min(deadline - now)) => {}
        }
        interval = policy.next_interval(interval);
    }

    warn!("Transaction {} not confirmed within {:?}", signature, timeout);
    TransactionOutcome::TimedOut
}
