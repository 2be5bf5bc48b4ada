//! Error types for minting.
//!
//! Failures are classified into a small set of user-facing kinds. Program
//! failures are classified by their program-defined error code only; the
//! free-text message that accompanies a code is carried for logging but never
//! inspected.

use chrono::{DateTime, Utc};
use displaydoc::Display;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Custom error codes raised by the candy machine sale program.
pub mod codes {
    /// Not enough SOL to pay for this minting (0x135)
    pub const NOT_ENOUGH_SOL: u32 = 0x135;

    /// Candy machine is empty (0x137)
    pub const CANDY_MACHINE_EMPTY: u32 = 0x137;

    /// Candy machine is not live yet (0x138)
    pub const CANDY_MACHINE_NOT_LIVE: u32 = 0x138;
}

/// User-facing failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    SaleNotLive,
    SoldOut,
    InsufficientFunds,
    TransactionTimeout,
    GenericFailure,
}

impl ErrorKind {
    /// Map a program-defined error code. Unknown codes are generic failures.
    pub fn from_program_code(code: u32) -> Self {
        match code {
            codes::NOT_ENOUGH_SOL => ErrorKind::InsufficientFunds,
            codes::CANDY_MACHINE_EMPTY => ErrorKind::SoldOut,
            codes::CANDY_MACHINE_NOT_LIVE => ErrorKind::SaleNotLive,
            _ => ErrorKind::GenericFailure,
        }
    }

    /// Message shown in the alert slot
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::SaleNotLive => "Minting period hasn't started yet.",
            ErrorKind::SoldOut => "SOLD OUT!",
            ErrorKind::InsufficientFunds => "Insufficient funds to mint. Please fund your wallet.",
            ErrorKind::TransactionTimeout => {
                "Mint timed out waiting for confirmation. Check your wallet before trying again."
            }
            ErrorKind::GenericFailure => "Minting failed! Please try again!",
        }
    }
}

/// An error reported by the ledger for a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramError {
    /// Program-defined custom error code, when the ledger reported one
    pub code: Option<u32>,
    pub message: String,
}

impl ProgramError {
    pub fn new(code: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Error carrying a program code
    pub fn with_code(code: u32) -> Self {
        Self::new(Some(code), format!("custom program error: {:#x}", code))
    }

    pub fn kind(&self) -> ErrorKind {
        self.code
            .map(ErrorKind::from_program_code)
            .unwrap_or(ErrorKind::GenericFailure)
    }
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {:#x})", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

/// Errors talking to the ledger
#[derive(Debug, Display, Error)]
pub enum ConnectionError {
    /// Transaction rejected by the program: {0}
    Rejected(ProgramError),

    /// RPC error {code}: {message}
    Rpc { code: i64, message: String },

    /// HTTP error: {0}
    Http(String),

    /// Invalid RPC response: {0}
    InvalidResponse(String),

    /// Failed to encode transaction: {0}
    Encode(String),

    /// No RPC endpoints configured
    NoEndpoints,

    /// All RPC endpoints failed
    AllEndpointsFailed,
}

impl From<reqwest::Error> for ConnectionError {
    fn from(err: reqwest::Error) -> Self {
        ConnectionError::Http(err.to_string())
    }
}

/// Errors from a wallet capability
#[derive(Debug, Display, Error)]
pub enum WalletError {
    /// Transaction payer {0} is not this wallet
    PayerMismatch(String),

    /// Invalid key material: {0}
    InvalidKey(String),

    /// Invalid mnemonic phrase: {0}
    InvalidMnemonic(String),

    /// IO error: {0}
    Io(#[from] std::io::Error),

    /// Invalid keypair file: {0}
    Json(#[from] serde_json::Error),
}

/// Errors from a mint attempt
#[derive(Debug, Display, Error)]
pub enum MintError {
    /// Sale has not started yet; it goes live at {0}
    SaleNotLive(DateTime<Utc>),

    /// Sale is sold out
    SoldOut,

    /// Mint quantity must be at least 1
    InvalidQuantity,

    /// Mint cancelled before anything was submitted
    Cancelled,

    /// Connection error: {0}
    Connection(#[from] ConnectionError),

    /// Wallet error: {0}
    Wallet(#[from] WalletError),
}

impl MintError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MintError::SaleNotLive(_) => ErrorKind::SaleNotLive,
            MintError::SoldOut => ErrorKind::SoldOut,
            MintError::Connection(ConnectionError::Rejected(err)) => err.kind(),
            MintError::InvalidQuantity
            | MintError::Cancelled
            | MintError::Connection(_)
            | MintError::Wallet(_) => ErrorKind::GenericFailure,
        }
    }
}

/// Result type for mint operations.
pub type MintResult<T> = Result<T, MintError>;
