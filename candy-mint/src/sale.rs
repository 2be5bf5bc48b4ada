//! Sale State
//!
//! Read-only snapshot of the sale program's metadata. A snapshot is never
//! patched; it is replaced wholesale every time the program is re-read.

use chrono::{DateTime, Utc};
use std::fmt;

/// Snapshot of the sale program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleState {
    items_available: u64,
    items_redeemed: u64,
    start_time: DateTime<Utc>,
    price: u64,
}

impl SaleState {
    /// Create a snapshot.
    ///
    /// `items_redeemed` is clamped to `items_available`.
    pub fn new(
        items_available: u64,
        items_redeemed: u64,
        start_time: DateTime<Utc>,
        price: u64,
    ) -> Self {
        Self {
            items_available,
            items_redeemed: items_redeemed.min(items_available),
            start_time,
            price,
        }
    }

    pub fn items_available(&self) -> u64 {
        self.items_available
    }

    pub fn items_redeemed(&self) -> u64 {
        self.items_redeemed
    }

    /// Always `items_available - items_redeemed`
    pub fn items_remaining(&self) -> u64 {
        self.items_available - self.items_redeemed
    }

    /// Go-live date of the sale
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Mint price in lamports
    pub fn price(&self) -> u64 {
        self.price
    }

    pub fn is_sold_out(&self) -> bool {
        self.items_remaining() == 0
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_time
    }

    /// Time left until the sale goes live, `None` once it is live
    pub fn countdown(&self, now: DateTime<Utc>) -> Option<Countdown> {
        Countdown::until(self.start_time, now)
    }

    /// Items left under a phase supply cap
    pub fn remaining_under_cap(&self, cap: u64) -> u64 {
        cap.min(self.items_available)
            .saturating_sub(self.items_redeemed)
    }
}

/// Time left before the sale opens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    /// Whole hours, days folded in
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl Countdown {
    /// Countdown from `now` to `target`, `None` once `now >= target`.
    ///
    /// Partial seconds round up, so the last second before the start still
    /// counts down instead of reading as live.
    pub fn until(target: DateTime<Utc>, now: DateTime<Utc>) -> Option<Self> {
        if now >= target {
            return None;
        }
        let millis = (target - now).num_milliseconds().max(1) as u64;
        let remaining = millis.div_ceil(1000);

        Some(Self {
            hours: remaining / 3600,
            minutes: (remaining % 3600) / 60,
            seconds: remaining % 60,
        })
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} hours, {} minutes, {} seconds",
            self.hours, self.minutes, self.seconds
        )
    }
}

/// State of the mint controls. Minting is only allowed when `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MintAvailability {
    /// No wallet connected
    Disconnected,
    SoldOut,
    /// Sale not started; controls show the countdown
    NotLive(Countdown),
    /// A mint is in flight
    Minting,
    Ready,
}

impl MintAvailability {
    pub fn can_mint(&self) -> bool {
        matches!(self, MintAvailability::Ready)
    }
}

impl fmt::Display for MintAvailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MintAvailability::Disconnected => f.write_str("wallet not connected"),
            MintAvailability::SoldOut => f.write_str("SOLD OUT"),
            MintAvailability::NotLive(countdown) => write!(f, "opens in {}", countdown),
            MintAvailability::Minting => f.write_str("minting..."),
            MintAvailability::Ready => f.write_str("ready to mint"),
        }
    }
}
