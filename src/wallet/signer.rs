//! Executor key custody
//!
//! SECURITY: This is the ONLY place where the executor private key exists.
//! - Keys are held in alloy's PrivateKeySigner
//! - Keys are never serialized and never logged
//! - The key only produces off-chain EIP-712 authorizations; it never sends
//!   transactions itself

use crate::console::ExecutableDigest;
use crate::{Error, Result};
use alloy::dyn_abi::TypedData;
use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::{Signature, SignerSync};
use secrecy::{ExposeSecret, SecretString};

/// Executor wallet that protects its private key
pub struct SecureWallet {
    signer: PrivateKeySigner,
    address: Address,
}

impl SecureWallet {
    /// Create a wallet from a secret hex-encoded private key
    pub fn from_secret(key: &SecretString) -> Result<Self> {
        Self::from_hex(key.expose_secret())
    }

    /// Create a wallet from a hex-encoded private key (with or without 0x)
    pub fn from_hex(key_hex: &str) -> Result<Self> {
        let key_hex = key_hex.trim();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

        // Do not echo the parse error: it may quote key material
        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|_| Error::Wallet("Invalid executor private key".to_string()))?;

        let address = signer.address();
        Ok(Self { signer, address })
    }

    /// Executor address (safe to share)
    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a 32-byte prehash
    pub fn sign_hash(&self, hash: &B256) -> Result<Signature> {
        self.signer
            .sign_hash_sync(hash)
            .map_err(|e| Error::Wallet(format!("Signing failed: {}", e)))
    }

    /// Sign a typed execution payload under its EIP-712 domain
    pub fn sign_digest(&self, digest: &ExecutableDigest) -> Result<Signature> {
        self.sign_hash(&digest.signing_hash())
    }

    /// Sign an EIP-712 message composed elsewhere (executor registration)
    pub fn sign_typed_data(&self, typed: &TypedData) -> Result<Signature> {
        let hash = typed
            .eip712_signing_hash()
            .map_err(|e| Error::Wallet(format!("Malformed typed data: {}", e)))?;
        self.sign_hash(&hash)
    }
}

impl std::fmt::Debug for SecureWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureWallet")
            .field("address", &self.address)
            .field("signer", &"[REDACTED]")
            .finish()
    }
}
