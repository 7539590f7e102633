//! Interfaces to the external encryption engine and decryption oracle.
//!
//! The ledger never touches ciphertext material. It threads
//! [`EncryptedHandle`]s through its tables and asks the engine to evaluate
//! homomorphic additions and to record access rights. Plaintext only comes
//! back through the [`DecryptionOracle`], and only for a request carrying a
//! valid owner-signed grant.
//!
//! # Submodules
//!
//! - [`coprocessor`]: In-process engine + oracle used by tests and the demo CLI

pub mod coprocessor;

use std::collections::HashMap;

use async_trait::async_trait;
use blake3::Hasher;
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};

use crate::auth::DecryptionGrant;
use crate::constants::DOMAIN_INPUT_PROOF;
use crate::core::types::hex_bytes;
use crate::{Address, ClearValue, EncryptedHandle, EncryptedInput, LedgerAddress, LedgerError};

pub use coprocessor::InMemoryCoprocessor;

/// Homomorphic encryption engine.
///
/// `add` must be pure: the same two handles always produce the same result
/// handle, and the reserved zero handle behaves as an encryption of 0.
pub trait EncryptionEngine: Send + Sync {
    /// Encrypts `plaintext` for `owner` on `ledger` and returns the handle
    /// together with a proof bound to that pair. Runs client side.
    fn encrypt(
        &self,
        plaintext: u64,
        owner: &Address,
        ledger: &LedgerAddress,
    ) -> Result<EncryptedInput, LedgerError>;

    /// Key that signs input proofs.
    fn input_verifier(&self) -> VerifyingKey;

    /// Homomorphic addition of two ciphertexts.
    fn add(&self, lhs: &EncryptedHandle, rhs: &EncryptedHandle)
        -> Result<EncryptedHandle, LedgerError>;

    /// Grants `account` the right to have `handle` decrypted.
    fn allow(&self, handle: &EncryptedHandle, account: &Address) -> Result<(), LedgerError>;
}

/// A handle paired with the ledger instance it belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleScopePair {
    pub handle: EncryptedHandle,
    pub ledger: LedgerAddress,
}

/// Grant fields forwarded to the oracle. The ephemeral private key stays with
/// the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDecryptRequest {
    pub user: Address,
    pub contract_scope: Vec<LedgerAddress>,
    #[serde(with = "hex_bytes")]
    pub ephemeral_public_key: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub signer_key: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
    pub start_timestamp: u64,
    pub duration_days: u64,
}

impl From<&DecryptionGrant> for UserDecryptRequest {
    fn from(grant: &DecryptionGrant) -> Self {
        Self {
            user: grant.user_address,
            contract_scope: grant.contract_scope.clone(),
            ephemeral_public_key: grant.ephemeral_public_key.clone(),
            signer_key: grant.signer_key.clone(),
            signature: grant.signature.clone(),
            start_timestamp: grant.start_timestamp,
            duration_days: grant.duration_days,
        }
    }
}

/// Remote threshold-decryption service.
#[async_trait]
pub trait DecryptionOracle: Send + Sync {
    /// Resolves every pair to its plaintext.
    ///
    /// Fails with [`LedgerError::Unauthorized`] when the grant does not cover
    /// a handle's ledger or user, and with [`LedgerError::OracleUnavailable`]
    /// on transient failure.
    async fn user_decrypt(
        &self,
        pairs: &[HandleScopePair],
        request: &UserDecryptRequest,
    ) -> Result<HashMap<EncryptedHandle, ClearValue>, LedgerError>;
}

/// Message signed by the engine to bind an input handle to `(ledger, owner)`.
pub fn input_proof_message(
    handle: &EncryptedHandle,
    ledger: &LedgerAddress,
    owner: &Address,
) -> [u8; 32] {
    let mut hasher = Hasher::new_derive_key(DOMAIN_INPUT_PROOF);
    hasher.update(handle.as_bytes());
    hasher.update(ledger.as_bytes());
    hasher.update(owner.as_bytes());
    *hasher.finalize().as_bytes()
}
