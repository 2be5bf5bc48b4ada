//! Key Management
//!
//! A local ed25519 keypair that implements [`WalletSigner`], for running the
//! minter without a browser wallet. Keys come from a BIP39 mnemonic
//! (SLIP-0010 derivation on `m/44'/501'/0'/0'`) or from a keypair file
//! holding a JSON array of bytes.
//!
//! Buffers holding secret bytes are wrapped in `Zeroizing` so they are wiped
//! when dropped; `SigningKey` zeroizes itself.

use async_trait::async_trait;
use bip39::{Language, Mnemonic, Seed};
use ed25519_dalek::{Signer, SigningKey};
use rand::{rngs::OsRng, RngCore};
use std::fs;
use std::path::Path;
use zeroize::Zeroizing;

use crate::address::{Address, Signature};
use crate::capability::WalletSigner;
use crate::error::WalletError;
use crate::transaction::{MintTransaction, SignedTransaction};

/// Hardened derivation path m/44'/501'/0'/0'
const DERIVATION_PATH: [u32; 4] = [44, 501, 0, 0];

/// An in-process wallet backed by an ed25519 keypair
pub struct KeypairWallet {
    signing_key: SigningKey,
    address: Address,
}

impl KeypairWallet {
    /// Generate a fresh random keypair
    pub fn generate() -> Self {
        let mut secret = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(&mut secret[..]);
        Self::from_secret(&secret)
    }

    fn from_secret(secret: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(secret);
        let address = Address::new(signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            address,
        }
    }

    /// Restore a wallet from a BIP39 mnemonic phrase
    pub fn from_mnemonic(phrase: &str) -> Result<Self, WalletError> {
        let mnemonic = Mnemonic::from_phrase(phrase.trim(), Language::English)
            .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;

        let seed = Seed::new(&mnemonic, "");
        let secret = Zeroizing::new(slip10_ed25519::derive_ed25519_private_key(
            seed.as_bytes(),
            &DERIVATION_PATH,
        ));

        Ok(Self::from_secret(&secret))
    }

    /// Load from raw keypair bytes.
    ///
    /// Accepts either 64 bytes (secret followed by public key) or a 32-byte
    /// secret.
    pub fn from_keypair_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        match bytes.len() {
            32 => {
                let mut secret = Zeroizing::new([0u8; 32]);
                secret.copy_from_slice(bytes);
                Ok(Self::from_secret(&secret))
            }
            64 => {
                let mut secret = Zeroizing::new([0u8; 32]);
                secret.copy_from_slice(&bytes[..32]);
                let wallet = Self::from_secret(&secret);

                if wallet.address.as_bytes()[..] != bytes[32..] {
                    return Err(WalletError::InvalidKey(
                        "public key does not match secret key".to_string(),
                    ));
                }
                Ok(wallet)
            }
            n => Err(WalletError::InvalidKey(format!(
                "expected 32 or 64 key bytes, got {}",
                n
            ))),
        }
    }

    /// Load a keypair file (JSON array of bytes)
    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let contents = Zeroizing::new(fs::read_to_string(path)?);
        let bytes: Zeroizing<Vec<u8>> = Zeroizing::new(serde_json::from_str(&contents)?);
        Self::from_keypair_bytes(&bytes)
    }

    /// Write the keypair file (JSON array of 64 bytes)
    pub fn save(&self, path: &Path) -> Result<(), WalletError> {
        let bytes = Zeroizing::new(self.signing_key.to_keypair_bytes().to_vec());
        let contents = Zeroizing::new(serde_json::to_string(&*bytes)?);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents.as_bytes())?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    pub fn address(&self) -> Address {
        self.address
    }

    fn sign_hash(&self, transaction: &MintTransaction) -> Signature {
        let signature = self.signing_key.sign(&transaction.signing_hash());
        Signature::new(signature.to_bytes())
    }
}

#[async_trait]
impl WalletSigner for KeypairWallet {
    fn public_address(&self) -> Address {
        self.address
    }

    async fn sign_transaction(
        &self,
        transaction: MintTransaction,
    ) -> Result<SignedTransaction, WalletError> {
        if transaction.payer != self.address {
            return Err(WalletError::PayerMismatch(transaction.payer.to_string()));
        }

        let signature = self.sign_hash(&transaction);
        Ok(SignedTransaction {
            transaction,
            signer: self.address,
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::MintTransactionBuilder;
    use tempfile::TempDir;

    const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_mnemonic_derivation_is_deterministic() {
        let a = KeypairWallet::from_mnemonic(TEST_MNEMONIC).unwrap();
        let b = KeypairWallet::from_mnemonic(TEST_MNEMONIC).unwrap();
        assert_eq!(a.address(), b.address());

        assert!(KeypairWallet::from_mnemonic("not a real phrase").is_err());
    }

    #[test]
    fn test_keypair_file_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("id.json");

        let wallet = KeypairWallet::generate();
        wallet.save(&path).unwrap();

        let loaded = KeypairWallet::load(&path).unwrap();
        assert_eq!(loaded.address(), wallet.address());
    }

    #[test]
    fn test_mismatched_public_half_rejected() {
        let wallet = KeypairWallet::generate();
        let mut bytes = wallet.signing_key.to_keypair_bytes();
        bytes[40] ^= 0xff;

        assert!(matches!(
            KeypairWallet::from_keypair_bytes(&bytes),
            Err(WalletError::InvalidKey(_))
        ));
        assert!(KeypairWallet::from_keypair_bytes(&[1u8; 10]).is_err());
    }

    #[tokio::test]
    async fn test_signed_transaction_verifies() {
        let wallet = KeypairWallet::generate();
        let builder = MintTransactionBuilder::new(
            Address::new([1u8; 32]),
            Address::new([2u8; 32]),
            wallet.address(),
            Address::new([4u8; 32]),
            100,
        );

        let signed = wallet.sign_transaction(builder.build()).await.unwrap();
        assert!(signed.verify());

        let mut tampered = signed.clone();
        tampered.transaction.price = 0;
        assert!(!tampered.verify());
    }

    #[tokio::test]
    async fn test_refuses_foreign_payer() {
        let wallet = KeypairWallet::generate();
        let builder = MintTransactionBuilder::new(
            Address::new([1u8; 32]),
            Address::new([2u8; 32]),
            Address::new([3u8; 32]),
            Address::new([4u8; 32]),
            100,
        );

        let batch = builder.build_batch(2);
        assert!(matches!(
            wallet.sign_all_transactions(batch).await,
            Err(WalletError::PayerMismatch(_))
        ));
    }
}
