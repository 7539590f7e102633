//! Handle admission.
//!
//! A handle is accepted only when its proof was issued by the engine's input
//! verifier for this exact `(ledger, owner)` pair. Verification is pure so the
//! ledger can check an input before committing anything.

use std::collections::HashMap;
use std::sync::Arc;

use ed25519_dalek::{Signature, SIGNATURE_LENGTH};
use tracing::{instrument, warn};

use crate::engine::{input_proof_message, EncryptionEngine};
use crate::{Address, EncryptedHandle, EncryptedInput, LedgerAddress, LedgerError};

pub struct HandleStore {
    ledger: LedgerAddress,
    engine: Arc<dyn EncryptionEngine>,
    accepted: HashMap<EncryptedHandle, Address>,
}

impl HandleStore {
    pub fn new(ledger: LedgerAddress, engine: Arc<dyn EncryptionEngine>) -> Self {
        Self {
            ledger,
            engine,
            accepted: HashMap::new(),
        }
    }

    /// Checks that `input` is a well-formed ciphertext bound to this ledger and `owner`.
    #[instrument(level = "debug", skip_all, fields(%owner, handle = %input.handle.short()))]
    pub fn verify(&self, owner: &Address, input: &EncryptedInput) -> Result<(), LedgerError> {
        if input.handle.is_zero() {
            return Err(LedgerError::InvalidProof(
                "zero handle cannot be submitted".into(),
            ));
        }
        if input.proof.len() != SIGNATURE_LENGTH {
            return Err(LedgerError::InvalidProof(format!(
                "proof must be {SIGNATURE_LENGTH} bytes, got {}",
                input.proof.len()
            )));
        }
        let signature = Signature::from_slice(&input.proof)
            .map_err(|err| LedgerError::InvalidProof(err.to_string()))?;
        let message = input_proof_message(&input.handle, &self.ledger, owner);
        self.engine
            .input_verifier()
            .verify_strict(&message, &signature)
            .map_err(|_| {
                warn!("input proof not bound to this ledger and owner");
                LedgerError::InvalidProof(format!(
                    "handle {} is not bound to ledger {} and owner {owner}",
                    input.handle.short(),
                    self.ledger
                ))
            })
    }

    pub(crate) fn record(&mut self, owner: Address, handle: EncryptedHandle) {
        self.accepted.insert(handle, owner);
    }

    /// Verifies and records an input in one step.
    pub fn submit(
        &mut self,
        owner: &Address,
        input: &EncryptedInput,
    ) -> Result<EncryptedHandle, LedgerError> {
        self.verify(owner, input)?;
        self.record(*owner, input.handle);
        Ok(input.handle)
    }

    /// Owner that submitted `handle`, if it was accepted here.
    pub fn owner_of(&self, handle: &EncryptedHandle) -> Option<&Address> {
        self.accepted.get(handle)
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::engine::InMemoryCoprocessor;

    fn setup() -> (Arc<InMemoryCoprocessor>, HandleStore, LedgerAddress) {
        let engine = Arc::new(InMemoryCoprocessor::new(Arc::new(ManualClock::new(0))));
        let ledger = Address::from_label("ledger-a");
        let store = HandleStore::new(ledger, engine.clone());
        (engine, store, ledger)
    }

    #[test]
    fn accepts_input_bound_to_ledger_and_owner() {
        let (engine, mut store, ledger) = setup();
        let alice = Address::from_label("alice");
        let input = engine.encrypt(500, &alice, &ledger).unwrap();

        let handle = store.submit(&alice, &input).unwrap();
        assert_eq!(handle, input.handle);
        assert_eq!(store.owner_of(&handle), Some(&alice));
    }

    #[test]
    fn rejects_input_for_other_owner() {
        let (engine, mut store, ledger) = setup();
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        let input = engine.encrypt(500, &alice, &ledger).unwrap();

        assert!(matches!(
            store.submit(&bob, &input),
            Err(LedgerError::InvalidProof(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn rejects_input_for_other_ledger() {
        let (engine, store, _) = setup();
        let alice = Address::from_label("alice");
        let other = Address::from_label("ledger-b");
        let input = engine.encrypt(500, &alice, &other).unwrap();

        assert!(matches!(
            store.verify(&alice, &input),
            Err(LedgerError::InvalidProof(_))
        ));
    }

    #[test]
    fn rejects_truncated_proof() {
        let (engine, store, ledger) = setup();
        let alice = Address::from_label("alice");
        let mut input = engine.encrypt(1, &alice, &ledger).unwrap();
        input.proof.truncate(10);

        match store.verify(&alice, &input).unwrap_err() {
            LedgerError::InvalidProof(msg) => assert!(msg.contains("64 bytes")),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
