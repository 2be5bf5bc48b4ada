//! Candy Machine Minter
//!
//! Orchestrates minting from an on-chain candy machine sale: submits one or
//! more signed mint transactions through a ledger connection, polls each one
//! to a terminal outcome, aggregates the results and publishes a single
//! user-facing alert.
//!
//! ## Capabilities
//!
//! - The wallet signs; keys never leave it ([`WalletSigner`])
//! - The ledger is reached through [`LedgerConnection`] and the sale program
//!   through [`SaleProgramReader`]; [`RpcPool`] implements both over JSON-RPC
//! - Program failures are classified by error code, never by message text

pub mod address;
pub mod alert;
pub mod balance;
pub mod capability;
pub mod config;
pub mod confirmation;
pub mod error;
pub mod keys;
pub mod orchestrator;
pub mod rpc_pool;
pub mod sale;
pub mod transaction;

pub use address::{Address, Signature};
pub use alert::{Alert, AlertSlot, Severity};
pub use capability::{LedgerConnection, SaleProgramReader, TransactionStatus, WalletSigner};
pub use config::MintConfig;
pub use confirmation::{poll_transaction_confirmation, PollPolicy, TransactionOutcome};
pub use error::{ConnectionError, ErrorKind, MintError, MintResult, ProgramError, WalletError};
pub use keys::KeypairWallet;
pub use orchestrator::{BatchReport, BatchResult, MintOrchestrator, MintReport, OrchestratorSettings};
pub use rpc_pool::RpcPool;
pub use sale::{Countdown, MintAvailability, SaleState};
