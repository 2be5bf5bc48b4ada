//! Mint Transaction Building
//!
//! Builds the mint transactions submitted against the sale program. Every
//! transaction carries a freshly generated mint address, so the transactions
//! of a batch are independent of each other and can land in any order.
//! Signing is delegated to a [`WalletSigner`](crate::capability::WalletSigner).

use anyhow::{anyhow, Result};
use ed25519_dalek::{Verifier, VerifyingKey};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::address::{Address, Signature};
use crate::error::ConnectionError;

/// Lamports per SOL
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Domain separator for signing hashes
const SIGNING_DOMAIN: &[u8] = b"candy-mint-v1";

/// A single unsigned mint request against the sale program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintTransaction {
    pub version: u32,
    /// Sale program (candy machine) id
    pub program_id: Address,
    /// Sale config account
    pub config: Address,
    /// Paying wallet
    pub payer: Address,
    /// Receives the mint payment
    pub treasury: Address,
    /// Fresh account for the minted item
    pub mint: Address,
    /// Price in lamports at build time
    pub price: u64,
    /// Unix timestamp (seconds) when built
    pub created_at: i64,
}

impl MintTransaction {
    /// Compute the signing hash (message to be signed)
    pub fn signing_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(SIGNING_DOMAIN);
        hasher.update(self.version.to_le_bytes());
        hasher.update(self.program_id.as_bytes());
        hasher.update(self.config.as_bytes());
        hasher.update(self.payer.as_bytes());
        hasher.update(self.treasury.as_bytes());
        hasher.update(self.mint.as_bytes());
        hasher.update(self.price.to_le_bytes());
        hasher.update(self.created_at.to_le_bytes());
        hasher.finalize().into()
    }
}

/// A mint transaction with the payer's signature attached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub transaction: MintTransaction,
    pub signer: Address,
    pub signature: Signature,
}

impl SignedTransaction {
    /// Transaction id as known to the ledger
    pub fn signature(&self) -> Signature {
        self.signature
    }

    /// Check the signature against the signer's public key
    pub fn verify(&self) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(self.signer.as_bytes()) else {
            return false;
        };
        let signature = ed25519_dalek::Signature::from_bytes(&self.signature.to_bytes());

        self.signer == self.transaction.payer
            && key
                .verify(&self.transaction.signing_hash(), &signature)
                .is_ok()
    }

    /// Serialize to hex for submission
    pub fn to_hex(&self) -> Result<String, ConnectionError> {
        let bytes = bincode::serialize(self).map_err(|e| ConnectionError::Encode(e.to_string()))?;
        Ok(hex::encode(bytes))
    }

    /// Decode a transaction produced by [`SignedTransaction::to_hex`]
    pub fn from_hex(data: &str) -> Result<Self> {
        let bytes = hex::decode(data.trim())?;
        Ok(bincode::deserialize(&bytes)?)
    }
}

/// Builds mint transactions for one sale program, payer and treasury
#[derive(Debug, Clone)]
pub struct MintTransactionBuilder {
    program_id: Address,
    config: Address,
    payer: Address,
    treasury: Address,
    price: u64,
}

impl MintTransactionBuilder {
    pub fn new(
        program_id: Address,
        config: Address,
        payer: Address,
        treasury: Address,
        price: u64,
    ) -> Self {
        Self {
            program_id,
            config,
            payer,
            treasury,
            price,
        }
    }

    /// Build one unsigned mint transaction
    pub fn build(&self) -> MintTransaction {
        let mut mint = [0u8; 32];
        OsRng.fill_bytes(&mut mint);

        MintTransaction {
            version: 1,
            program_id: self.program_id,
            config: self.config,
            payer: self.payer,
            treasury: self.treasury,
            mint: Address::new(mint),
            price: self.price,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Build `quantity` independent mint transactions
    pub fn build_batch(&self, quantity: u32) -> Vec<MintTransaction> {
        (0..quantity).map(|_| self.build()).collect()
    }
}

/// Format an amount in lamports as SOL
pub fn format_amount(lamports: u64) -> String {
    let sol = lamports as f64 / LAMPORTS_PER_SOL as f64;
    format!("{:.4} SOL", sol)
}

/// Parse a SOL amount string to lamports
pub fn parse_amount(sol: &str) -> Result<u64> {
    let value: f64 = sol
        .trim()
        .trim_end_matches(" SOL")
        .trim_end_matches("SOL")
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid amount format"))?;

    if !value.is_finite() {
        return Err(anyhow!("Invalid amount format"));
    }
    if value < 0.0 {
        return Err(anyhow!("Amount cannot be negative"));
    }

    Ok((value * LAMPORTS_PER_SOL as f64).round() as u64)
}
