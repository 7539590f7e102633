//! User-side signing of grant messages.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use tracing::{debug, instrument};

use super::GrantMessage;
use crate::{Address, LedgerError};

/// Wallet-like signer. Signing may wait indefinitely on the user and may be
/// declined, in which case it fails with [`LedgerError::GrantDeclined`].
#[async_trait]
pub trait GrantSigner: Send + Sync {
    fn address(&self) -> Address;

    fn verifying_key(&self) -> VerifyingKey;

    async fn sign_grant(&self, message: &GrantMessage) -> Result<Signature, LedgerError>;
}

/// Signer backed by a local Ed25519 key.
///
/// Approval can be delayed or declined to emulate a user at a wallet prompt.
pub struct LocalSigner {
    key: SigningKey,
    approval_delay: Option<Duration>,
    declines: AtomicBool,
    sign_requests: AtomicUsize,
}

impl LocalSigner {
    pub fn new(key: SigningKey) -> Self {
        Self {
            key,
            approval_delay: None,
            declines: AtomicBool::new(false),
            sign_requests: AtomicUsize::new(0),
        }
    }

    pub fn random() -> Self {
        Self::new(SigningKey::generate(&mut OsRng))
    }

    pub fn with_approval_delay(mut self, delay: Duration) -> Self {
        self.approval_delay = Some(delay);
        self
    }

    pub fn set_declines(&self, declines: bool) {
        self.declines.store(declines, Ordering::SeqCst);
    }

    /// Signature prompts shown so far, approved or not.
    pub fn sign_requests(&self) -> usize {
        self.sign_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GrantSigner for LocalSigner {
    fn address(&self) -> Address {
        Address::from_verifying_key(&self.key.verifying_key())
    }

    fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    #[instrument(level = "debug", skip_all, fields(user = %message.user))]
    async fn sign_grant(&self, message: &GrantMessage) -> Result<Signature, LedgerError> {
        self.sign_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.approval_delay {
            tokio::time::sleep(delay).await;
        }
        if self.declines.load(Ordering::SeqCst) {
            debug!("signature request declined");
            return Err(LedgerError::GrantDeclined(message.user));
        }
        Ok(self.key.sign(&message.digest()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(user: Address) -> GrantMessage {
        GrantMessage {
            user,
            contract_scope: vec![Address::from_label("ledger")],
            ephemeral_public_key: vec![1; 32],
            start_timestamp: 0,
            duration_days: 1,
        }
    }

    #[tokio::test]
    async fn signs_digest_with_own_key() {
        let signer = LocalSigner::random();
        let msg = message(signer.address());
        let signature = signer.sign_grant(&msg).await.unwrap();
        assert!(signer
            .verifying_key()
            .verify_strict(&msg.digest(), &signature)
            .is_ok());
        assert_eq!(signer.sign_requests(), 1);
    }

    #[tokio::test]
    async fn decline_is_reported_as_grant_declined() {
        let signer = LocalSigner::random();
        signer.set_declines(true);
        let err = signer
            .sign_grant(&message(signer.address()))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::GrantDeclined(user) if user == signer.address()));
        assert!(err.is_recoverable());
    }
}
