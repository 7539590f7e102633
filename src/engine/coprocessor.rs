//! In-process stand-in for the encryption engine and the decryption oracle.
//!
//! Handles are BLAKE3 digests; the plaintext table lives behind a mutex that
//! only the oracle path reads. Input proofs are Ed25519 signatures by the
//! coprocessor's input-verifier key over `(handle, ledger, owner)`.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use blake3::Hasher;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand_core::RngCore;
use tracing::{debug, instrument};

use super::{input_proof_message, DecryptionOracle, EncryptionEngine, HandleScopePair, UserDecryptRequest};
use crate::auth::GrantMessage;
use crate::constants::{
    DOMAIN_ADD_HANDLE, DOMAIN_INPUT_HANDLE, MAX_GRANT_DURATION_DAYS, SECONDS_PER_DAY,
};
use crate::core::clock::Clock;
use crate::{Address, ClearValue, EncryptedHandle, EncryptedInput, LedgerAddress, LedgerError};

#[derive(Debug, Default)]
struct CoprocessorState {
    values: HashMap<EncryptedHandle, u64>,
    acl: HashMap<EncryptedHandle, HashSet<Address>>,
}

/// Reference encryption engine and decryption oracle.
pub struct InMemoryCoprocessor {
    state: Mutex<CoprocessorState>,
    input_signer: SigningKey,
    clock: Arc<dyn Clock>,
    available: AtomicBool,
    decrypt_calls: AtomicUsize,
}

impl std::fmt::Debug for InMemoryCoprocessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCoprocessor")
            .field("input_verifier", &self.input_signer.verifying_key())
            .field("available", &self.available.load(Ordering::SeqCst))
            .field("decrypt_calls", &self.decrypt_calls.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl InMemoryCoprocessor {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(CoprocessorState::default()),
            input_signer: SigningKey::generate(&mut OsRng),
            clock,
            available: AtomicBool::new(true),
            decrypt_calls: AtomicUsize::new(0),
        }
    }

    /// Simulates an outage: while unavailable every decryption request fails
    /// with [`LedgerError::OracleUnavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of `user_decrypt` round trips served so far.
    pub fn decrypt_calls(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, CoprocessorState>, LedgerError> {
        self.state
            .lock()
            .map_err(|_| LedgerError::LockPoisoned("coprocessor state"))
    }

    fn value_of(state: &CoprocessorState, handle: &EncryptedHandle) -> Result<u64, LedgerError> {
        if handle.is_zero() {
            return Ok(0);
        }
        state
            .values
            .get(handle)
            .copied()
            .ok_or(LedgerError::UnknownHandle(*handle))
    }

    fn check_request(&self, request: &UserDecryptRequest) -> Result<(), LedgerError> {
        if request.duration_days == 0 || request.duration_days > MAX_GRANT_DURATION_DAYS {
            return Err(LedgerError::Unauthorized(format!(
                "grant duration {} days outside 1..={MAX_GRANT_DURATION_DAYS}",
                request.duration_days
            )));
        }
        let now = self.clock.now();
        let expires_at = request
            .start_timestamp
            .saturating_add(request.duration_days.saturating_mul(SECONDS_PER_DAY));
        if now < request.start_timestamp || now > expires_at {
            return Err(LedgerError::Unauthorized(format!(
                "grant not valid at {now} (window {}..={expires_at})",
                request.start_timestamp
            )));
        }

        let key_bytes: [u8; 32] = request
            .signer_key
            .as_slice()
            .try_into()
            .map_err(|_| LedgerError::Unauthorized("malformed signer key".into()))?;
        let signer_key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|err| LedgerError::Unauthorized(format!("invalid signer key: {err}")))?;
        if Address::from_verifying_key(&signer_key) != request.user {
            return Err(LedgerError::Unauthorized(
                "signer key does not control the grant user".into(),
            ));
        }
        let signature = Signature::from_slice(&request.signature)
            .map_err(|err| LedgerError::Unauthorized(format!("malformed signature: {err}")))?;
        let message = GrantMessage {
            user: request.user,
            contract_scope: request.contract_scope.clone(),
            ephemeral_public_key: request.ephemeral_public_key.clone(),
            start_timestamp: request.start_timestamp,
            duration_days: request.duration_days,
        };
        signer_key
            .verify_strict(&message.digest(), &signature)
            .map_err(|err| LedgerError::Unauthorized(format!("invalid grant signature: {err}")))
    }
}

impl EncryptionEngine for InMemoryCoprocessor {
    #[instrument(level = "debug", skip_all, fields(%owner, %ledger))]
    fn encrypt(
        &self,
        plaintext: u64,
        owner: &Address,
        ledger: &LedgerAddress,
    ) -> Result<EncryptedInput, LedgerError> {
        let mut nonce = [0u8; 32];
        OsRng.fill_bytes(&mut nonce);
        let mut hasher = Hasher::new_derive_key(DOMAIN_INPUT_HANDLE);
        hasher.update(ledger.as_bytes());
        hasher.update(owner.as_bytes());
        hasher.update(&nonce);
        let handle = EncryptedHandle(*hasher.finalize().as_bytes());

        self.lock()?.values.insert(handle, plaintext);

        let proof = self
            .input_signer
            .sign(&input_proof_message(&handle, ledger, owner));
        Ok(EncryptedInput {
            handle,
            proof: proof.to_bytes().to_vec(),
        })
    }

    fn input_verifier(&self) -> VerifyingKey {
        self.input_signer.verifying_key()
    }

    #[instrument(level = "trace", skip_all, fields(lhs = %lhs.short(), rhs = %rhs.short()))]
    fn add(
        &self,
        lhs: &EncryptedHandle,
        rhs: &EncryptedHandle,
    ) -> Result<EncryptedHandle, LedgerError> {
        let mut state = self.lock()?;
        // 64-bit encrypted integers wrap on overflow.
        let sum = Self::value_of(&state, lhs)?.wrapping_add(Self::value_of(&state, rhs)?);

        let mut hasher = Hasher::new_derive_key(DOMAIN_ADD_HANDLE);
        hasher.update(lhs.as_bytes());
        hasher.update(rhs.as_bytes());
        let result = EncryptedHandle(*hasher.finalize().as_bytes());
        state.values.insert(result, sum);
        Ok(result)
    }

    fn allow(&self, handle: &EncryptedHandle, account: &Address) -> Result<(), LedgerError> {
        let mut state = self.lock()?;
        if !handle.is_zero() && !state.values.contains_key(handle) {
            return Err(LedgerError::UnknownHandle(*handle));
        }
        state.acl.entry(*handle).or_default().insert(*account);
        Ok(())
    }
}

#[async_trait]
impl DecryptionOracle for InMemoryCoprocessor {
    #[instrument(level = "info", skip_all, fields(pairs = pairs.len(), user = %request.user))]
    async fn user_decrypt(
        &self,
        pairs: &[HandleScopePair],
        request: &UserDecryptRequest,
    ) -> Result<HashMap<EncryptedHandle, ClearValue>, LedgerError> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        if !self.available.load(Ordering::SeqCst) {
            return Err(LedgerError::OracleUnavailable(
                "decryption service not reachable".into(),
            ));
        }
        self.check_request(request)?;

        let state = self.lock()?;
        let mut out = HashMap::with_capacity(pairs.len());
        for pair in pairs {
            if pair.handle.is_zero() {
                return Err(LedgerError::InvalidInput(
                    "zero handle is not a ciphertext".into(),
                ));
            }
            if !request.contract_scope.contains(&pair.ledger) {
                return Err(LedgerError::Unauthorized(format!(
                    "ledger {} not in grant scope",
                    pair.ledger
                )));
            }
            let allowed = state.acl.get(&pair.handle);
            let permitted = allowed
                .map(|accounts| accounts.contains(&request.user) && accounts.contains(&pair.ledger))
                .unwrap_or(false);
            if !permitted {
                return Err(LedgerError::Unauthorized(format!(
                    "{} may not decrypt handle {}",
                    request.user, pair.handle
                )));
            }
            let value = Self::value_of(&state, &pair.handle)?;
            out.insert(pair.handle, ClearValue::Uint(value));
        }
        debug!(resolved = out.len(), "user decrypt served");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::ZERO_HANDLE;

    fn coprocessor() -> InMemoryCoprocessor {
        InMemoryCoprocessor::new(Arc::new(ManualClock::new(1_000)))
    }

    #[test]
    fn add_is_deterministic_and_treats_zero_as_identity() {
        let engine = coprocessor();
        let owner = Address::from_label("alice");
        let ledger = Address::from_label("ledger");
        let input = engine.encrypt(42, &owner, &ledger).unwrap();

        let first = engine.add(&ZERO_HANDLE, &input.handle).unwrap();
        let second = engine.add(&ZERO_HANDLE, &input.handle).unwrap();
        assert_eq!(first, second);

        let state = engine.lock().unwrap();
        assert_eq!(InMemoryCoprocessor::value_of(&state, &first).unwrap(), 42);
    }

    #[test]
    fn add_rejects_unknown_handles() {
        let engine = coprocessor();
        let bogus = EncryptedHandle([9u8; 32]);
        match engine.add(&ZERO_HANDLE, &bogus).unwrap_err() {
            LedgerError::UnknownHandle(handle) => assert_eq!(handle, bogus),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn input_proof_verifies_under_engine_key() {
        let engine = coprocessor();
        let owner = Address::from_label("alice");
        let ledger = Address::from_label("ledger");
        let input = engine.encrypt(1, &owner, &ledger).unwrap();
        let signature = Signature::from_slice(&input.proof).unwrap();
        let message = input_proof_message(&input.handle, &ledger, &owner);
        assert!(engine
            .input_verifier()
            .verify_strict(&message, &signature)
            .is_ok());
    }
}
