//! Owner-signed decryption grants.
//!
//! A grant binds the user, the set of ledgers it covers, a fresh ephemeral
//! public key and a validity window. The user signs the BLAKE3 digest of that
//! message; the oracle re-derives the digest and checks the signature before
//! revealing any plaintext.

use std::fmt;

use blake3::Hasher;
use ed25519_dalek::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::constants::{DOMAIN_GRANT_KEY, DOMAIN_USER_DECRYPT, SECONDS_PER_DAY};
use crate::core::types::hex_bytes;
use crate::{Address, LedgerAddress, LedgerError};

/// Sorts and deduplicates a ledger scope so equal sets compare equal.
pub fn normalize_scope(scope: &[LedgerAddress]) -> Vec<LedgerAddress> {
    let mut scope = scope.to_vec();
    scope.sort_unstable();
    scope.dedup();
    scope
}

/// Key under which the grant for `(user, scope)` is persisted.
pub fn storage_key(user: &Address, scope: &[LedgerAddress]) -> String {
    let mut hasher = Hasher::new_derive_key(DOMAIN_GRANT_KEY);
    hasher.update(user.as_bytes());
    for ledger in normalize_scope(scope) {
        hasher.update(ledger.as_bytes());
    }
    format!("grant-{}", hasher.finalize().to_hex())
}

/// The structured message a user signs to authorize decryption.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantMessage {
    pub user: Address,
    pub contract_scope: Vec<LedgerAddress>,
    #[serde(with = "hex_bytes")]
    pub ephemeral_public_key: Vec<u8>,
    pub start_timestamp: u64,
    pub duration_days: u64,
}

impl GrantMessage {
    /// Domain-separated digest over every field, in declaration order.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Hasher::new_derive_key(DOMAIN_USER_DECRYPT);
        hasher.update(self.user.as_bytes());
        hasher.update(&(self.contract_scope.len() as u32).to_le_bytes());
        for ledger in &self.contract_scope {
            hasher.update(ledger.as_bytes());
        }
        hasher.update(&(self.ephemeral_public_key.len() as u32).to_le_bytes());
        hasher.update(&self.ephemeral_public_key);
        hasher.update(&self.start_timestamp.to_le_bytes());
        hasher.update(&self.duration_days.to_le_bytes());
        *hasher.finalize().as_bytes()
    }
}

/// A signed, time-bounded decryption authorization.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionGrant {
    pub user_address: Address,
    /// Sorted, deduplicated ledger addresses.
    pub contract_scope: Vec<LedgerAddress>,
    #[serde(with = "hex_bytes")]
    pub ephemeral_public_key: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub ephemeral_private_key: Vec<u8>,
    /// Verifying key of the user's signer.
    #[serde(with = "hex_bytes")]
    pub signer_key: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
    pub start_timestamp: u64,
    pub duration_days: u64,
}

impl fmt::Debug for DecryptionGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionGrant")
            .field("user_address", &self.user_address)
            .field("contract_scope", &self.contract_scope)
            .field("ephemeral_private_key", &"<redacted>")
            .field("start_timestamp", &self.start_timestamp)
            .field("duration_days", &self.duration_days)
            .finish_non_exhaustive()
    }
}

impl DecryptionGrant {
    /// Last second at which the grant is still valid.
    pub fn expires_at(&self) -> u64 {
        self.start_timestamp
            .saturating_add(self.duration_days.saturating_mul(SECONDS_PER_DAY))
    }

    pub fn is_valid_at(&self, now: u64) -> bool {
        now >= self.start_timestamp && now <= self.expires_at()
    }

    /// Whether every ledger in `scope` is inside this grant's scope.
    pub fn covers(&self, scope: &[LedgerAddress]) -> bool {
        scope
            .iter()
            .all(|ledger| self.contract_scope.binary_search(ledger).is_ok())
    }

    pub fn message(&self) -> GrantMessage {
        GrantMessage {
            user: self.user_address,
            contract_scope: self.contract_scope.clone(),
            ephemeral_public_key: self.ephemeral_public_key.clone(),
            start_timestamp: self.start_timestamp,
            duration_days: self.duration_days,
        }
    }

    /// Checks that the signer key controls `user_address` and signed this grant.
    pub fn verify_signature(&self) -> Result<(), LedgerError> {
        let key_bytes: [u8; 32] = self
            .signer_key
            .as_slice()
            .try_into()
            .map_err(|_| LedgerError::InvalidInput("malformed signer key".into()))?;
        let key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|err| LedgerError::InvalidInput(format!("invalid signer key: {err}")))?;
        if Address::from_verifying_key(&key) != self.user_address {
            return Err(LedgerError::InvalidInput(
                "signer key does not match grant user".into(),
            ));
        }
        let signature = Signature::from_slice(&self.signature)
            .map_err(|err| LedgerError::InvalidInput(format!("malformed signature: {err}")))?;
        key.verify_strict(&self.message().digest(), &signature)
            .map_err(|err| LedgerError::InvalidInput(format!("grant signature: {err}")))
    }

    pub fn storage_key(&self) -> String {
        storage_key(&self.user_address, &self.contract_scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;

    fn signed_grant(scope: &[LedgerAddress], start: u64, days: u64) -> DecryptionGrant {
        let user_key = SigningKey::generate(&mut OsRng);
        let ephemeral = SigningKey::generate(&mut OsRng);
        let message = GrantMessage {
            user: Address::from_verifying_key(&user_key.verifying_key()),
            contract_scope: normalize_scope(scope),
            ephemeral_public_key: ephemeral.verifying_key().to_bytes().to_vec(),
            start_timestamp: start,
            duration_days: days,
        };
        let signature = user_key.sign(&message.digest());
        DecryptionGrant {
            user_address: message.user,
            contract_scope: message.contract_scope,
            ephemeral_public_key: message.ephemeral_public_key,
            ephemeral_private_key: ephemeral.to_bytes().to_vec(),
            signer_key: user_key.verifying_key().to_bytes().to_vec(),
            signature: signature.to_bytes().to_vec(),
            start_timestamp: start,
            duration_days: days,
        }
    }

    #[test]
    fn validity_window_is_inclusive() {
        let grant = signed_grant(&[Address::from_label("l")], 1_000, 1);
        assert!(!grant.is_valid_at(999));
        assert!(grant.is_valid_at(1_000));
        assert!(grant.is_valid_at(1_000 + SECONDS_PER_DAY));
        assert!(!grant.is_valid_at(1_001 + SECONDS_PER_DAY));
    }

    #[test]
    fn covers_subsets_only() {
        let a = Address::from_label("a");
        let b = Address::from_label("b");
        let c = Address::from_label("c");
        let grant = signed_grant(&[b, a], 0, 1);
        assert!(grant.covers(&[a]));
        assert!(grant.covers(&[a, b]));
        assert!(!grant.covers(&[a, c]));
    }

    #[test]
    fn storage_key_ignores_scope_order() {
        let user = Address::from_label("user");
        let a = Address::from_label("a");
        let b = Address::from_label("b");
        assert_eq!(storage_key(&user, &[a, b]), storage_key(&user, &[b, a, a]));
        assert_ne!(storage_key(&user, &[a]), storage_key(&user, &[a, b]));
    }

    #[test]
    fn tampered_grant_fails_verification() {
        let mut grant = signed_grant(&[Address::from_label("l")], 0, 30);
        assert!(grant.verify_signature().is_ok());
        grant.duration_days = 365;
        assert!(grant.verify_signature().is_err());
    }

    #[test]
    fn debug_output_redacts_private_key() {
        let grant = signed_grant(&[Address::from_label("l")], 0, 1);
        let rendered = format!("{grant:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains(&hex::encode(&grant.ephemeral_private_key)));
    }

    #[test]
    fn grant_survives_json_round_trip() {
        let grant = signed_grant(&[Address::from_label("l")], 5, 2);
        let json = serde_json::to_string(&grant).unwrap();
        let back: DecryptionGrant = serde_json::from_str(&json).unwrap();
        assert_eq!(back, grant);
        assert!(back.verify_signature().is_ok());
    }
}
