//! Balance Settle
//!
//! After a batch the ledger may keep reporting the pre-mint balance for a
//! while. This waits, on a fixed interval, until the observed balance has
//! dropped to an expected post-spend threshold.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::address::Address;
use crate::capability::LedgerConnection;

/// Result of waiting for the balance to settle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceSettle {
    /// Balance observed at or below the threshold
    Settled(u64),
    /// Window closed first
    TimedOut { last_seen: Option<u64> },
    Cancelled,
}

impl BalanceSettle {
    pub fn is_settled(&self) -> bool {
        matches!(self, BalanceSettle::Settled(_))
    }

    /// Most recent balance observed, if any
    pub fn last_balance(&self) -> Option<u64> {
        match self {
            BalanceSettle::Settled(balance) => Some(*balance),
            BalanceSettle::TimedOut { last_seen } => *last_seen,
            BalanceSettle::Cancelled => None,
        }
    }
}

/// Poll `address` until its balance is at or below `threshold`
pub async fn wait_for_balance_settle<C>(
    connection: &C,
    address: &Address,
    threshold: u64,
    interval: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
) -> BalanceSettle
where
    C: LedgerConnection + ?Sized,
{
    let deadline = Instant::now() + timeout;
    let mut last_seen = None;

    loop {
        let balance = tokio::select! {
            biased;
            _ = cancel.cancelled() => return BalanceSettle::Cancelled,
            balance = tokio::time::timeout_at(deadline, connection.get_balance(address)) => balance,
        };

        match balance {
            Ok(Ok(balance)) => {
                last_seen = Some(balance);
                if balance <= threshold {
                    debug!("Balance settled at {} (threshold {})", balance, threshold);
                    return BalanceSettle::Settled(balance);
                }
                debug!("Balance {} still above {}", balance, threshold);
            }
            Ok(Err(e)) => debug!("Balance query failed: {}", e),
            Err(_) => break,
        }

        let now = Instant::now();
        if now >= deadline {
            break;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return BalanceSettle::Cancelled,
            _ = tokio::time::sleep(interval.min(deadline - now)) => {}
        }
    }

    warn!(
        "Balance did not settle to {} within {:?} (last seen {:?})",
        threshold, timeout, last_seen
    );
    BalanceSettle::TimedOut { last_seen }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Signature;
    use crate::capability::TransactionStatus;
    use crate::error::ConnectionError;
    use crate::transaction::SignedTransaction;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Balance that drops by `step` on every query
    struct DrainingBalance {
        balance: AtomicU64,
        step: u64,
    }

    #[async_trait]
    impl LedgerConnection for DrainingBalance {
        async fn get_balance(&self, _address: &Address) -> Result<u64, ConnectionError> {
            Ok(self.balance.fetch_sub(self.step, Ordering::SeqCst))
        }

        async fn submit(&self, _tx: &SignedTransaction) -> Result<Signature, ConnectionError> {
            Err(ConnectionError::AllEndpointsFailed)
        }

        async fn get_status(&self, _sig: &Signature) -> Result<TransactionStatus, ConnectionError> {
            Ok(TransactionStatus::Pending)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_settles_once_balance_drops() {
        let conn = DrainingBalance {
            balance: AtomicU64::new(1_000),
            step: 100,
        };

        let result = wait_for_balance_settle(
            &conn,
            &Address::default(),
            750,
            Duration::from_secs(1),
            Duration::from_secs(60),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result, BalanceSettle::Settled(700));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_with_last_seen() {
        let conn = DrainingBalance {
            balance: AtomicU64::new(1_000),
            step: 0,
        };

        let start = Instant::now();
        let result = wait_for_balance_settle(
            &conn,
            &Address::default(),
            500,
            Duration::from_secs(1),
            Duration::from_secs(5),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(
            result,
            BalanceSettle::TimedOut {
                last_seen: Some(1_000)
            }
        );
        assert!(start.elapsed() <= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_settle() {
        let conn = DrainingBalance {
            balance: AtomicU64::new(1_000),
            step: 0,
        };
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = wait_for_balance_settle(
            &conn,
            &Address::default(),
            0,
            Duration::from_secs(1),
            Duration::from_secs(5),
            &cancel,
        )
        .await;

        assert_eq!(result, BalanceSettle::Cancelled);
    }
}
