//! External capabilities driven by the mint orchestrator.
//!
//! The orchestrator is not a wallet, a ledger client or the sale program; it
//! only drives them through these traits.

use async_trait::async_trait;

use crate::address::{Address, Signature};
use crate::error::{ConnectionError, ProgramError, WalletError};
use crate::sale::SaleState;
use crate::transaction::{MintTransaction, SignedTransaction};

/// Status of a submitted transaction as seen by the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Not yet observed at the required commitment
    Pending,
    /// Landed successfully
    Confirmed,
    /// Landed with an on-chain error
    Errored(ProgramError),
}

/// A connected wallet that can sign on behalf of its address
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Address that pays for and receives mints
    fn public_address(&self) -> Address;

    /// Sign a single transaction
    async fn sign_transaction(
        &self,
        transaction: MintTransaction,
    ) -> Result<SignedTransaction, WalletError>;

    /// Sign a batch of transactions in one approval
    async fn sign_all_transactions(
        &self,
        transactions: Vec<MintTransaction>,
    ) -> Result<Vec<SignedTransaction>, WalletError> {
        let mut signed = Vec::with_capacity(transactions.len());
        for transaction in transactions {
            signed.push(self.sign_transaction(transaction).await?);
        }
        Ok(signed)
    }
}

/// Read-only access to the ledger
#[async_trait]
pub trait LedgerConnection: Send + Sync {
    /// Balance in lamports
    async fn get_balance(&self, address: &Address) -> Result<u64, ConnectionError>;

    /// Submit a signed transaction, returning its signature
    async fn submit(&self, transaction: &SignedTransaction) -> Result<Signature, ConnectionError>;

    /// Current status of a submitted transaction
    async fn get_status(&self, signature: &Signature) -> Result<TransactionStatus, ConnectionError>;
}

/// Reads sale metadata from the on-chain sale program
#[async_trait]
pub trait SaleProgramReader: Send + Sync {
    async fn load(&self, program_id: &Address) -> Result<SaleState, ConnectionError>;
}
