//! Grant lifecycle: reuse while valid, reload after restart, re-sign after expiry.

use std::collections::HashMap;
use std::sync::Arc;

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::grant::{normalize_scope, storage_key};
use super::{DecryptionGrant, GrantMessage, GrantSigner, KeyValueStore};
use crate::constants::MAX_GRANT_DURATION_DAYS;
use crate::core::clock::Clock;
use crate::{Address, LedgerAddress, LedgerError};

/// Decryption authorization manager.
///
/// Holds a per-user memo of signed grants in front of a persistent
/// [`KeyValueStore`]. A cached grant serves any request whose scope is a subset
/// of its own; a broader request always prompts a new signature.
///
/// Lookups and signing for one `(user, scope)` key are serialized, so
/// concurrent callers sharing a manager wait for the pending prompt instead
/// of opening a second one.
pub struct GrantManager {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    duration_days: u64,
    memo: Mutex<HashMap<Address, Vec<DecryptionGrant>>>,
    signing: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl GrantManager {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        duration_days: u64,
    ) -> Result<Self, LedgerError> {
        if duration_days == 0 || duration_days > MAX_GRANT_DURATION_DAYS {
            return Err(LedgerError::InvalidConfig(format!(
                "grant duration must be 1..={MAX_GRANT_DURATION_DAYS} days, got {duration_days}"
            )));
        }
        Ok(Self {
            store,
            clock,
            duration_days,
            memo: Mutex::new(HashMap::new()),
            signing: Mutex::new(HashMap::new()),
        })
    }

    pub fn duration_days(&self) -> u64 {
        self.duration_days
    }

    /// Returns a valid grant covering `scope`, signing a new one if needed.
    ///
    /// `Ok(None)` means the user declined to sign; decryption is unavailable
    /// for now and the caller may ask again later.
    #[instrument(level = "info", skip_all, fields(user = %signer.address(), scope = scope.len()))]
    pub async fn load_or_sign(
        &self,
        signer: &dyn GrantSigner,
        scope: &[LedgerAddress],
    ) -> Result<Option<DecryptionGrant>, LedgerError> {
        let scope = normalize_scope(scope);
        if scope.is_empty() {
            return Err(LedgerError::InvalidInput(
                "grant scope must name at least one ledger".into(),
            ));
        }
        let user = signer.address();
        let key = storage_key(&user, &scope);
        let slot = self.signing_slot(&key).await;
        let _signing = slot.lock().await;

        if let Some(grant) = self.memoized(&user, &scope).await {
            debug!("reusing cached grant");
            return Ok(Some(grant));
        }

        if let Some(grant) = self.load_persisted(&key, &user, &scope).await {
            debug!("restored grant from storage");
            self.remember(grant.clone()).await;
            return Ok(Some(grant));
        }

        let ephemeral = SigningKey::generate(&mut OsRng);
        let message = GrantMessage {
            user,
            contract_scope: scope,
            ephemeral_public_key: ephemeral.verifying_key().to_bytes().to_vec(),
            start_timestamp: self.clock.now(),
            duration_days: self.duration_days,
        };
        let signature = match signer.sign_grant(&message).await {
            Ok(signature) => signature,
            Err(LedgerError::GrantDeclined(_)) => {
                info!("user declined to sign decryption grant");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let grant = DecryptionGrant {
            user_address: user,
            contract_scope: message.contract_scope,
            ephemeral_public_key: message.ephemeral_public_key,
            ephemeral_private_key: ephemeral.to_bytes().to_vec(),
            signer_key: signer.verifying_key().to_bytes().to_vec(),
            signature: signature.to_bytes().to_vec(),
            start_timestamp: message.start_timestamp,
            duration_days: message.duration_days,
        };

        match serde_json::to_string(&grant) {
            Ok(json) => {
                if let Err(err) = self.store.set_item(&key, json).await {
                    warn!(%err, "failed to persist grant; it stays valid for this session");
                }
            }
            Err(err) => warn!(%err, "failed to serialize grant"),
        }
        self.remember(grant.clone()).await;
        info!(expires_at = grant.expires_at(), "decryption grant signed");
        Ok(Some(grant))
    }

    /// Drops every memoized grant for `user`. Persisted grants are kept.
    pub async fn forget(&self, user: &Address) {
        self.memo.lock().await.remove(user);
    }

    /// Number of grants held in memory for `user`, expired ones included.
    pub async fn cached_grants(&self, user: &Address) -> usize {
        self.memo
            .lock()
            .await
            .get(user)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Lock held while the grant for `key` is looked up or signed.
    async fn signing_slot(&self, key: &str) -> Arc<Mutex<()>> {
        self.signing
            .lock()
            .await
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    async fn memoized(&self, user: &Address, scope: &[LedgerAddress]) -> Option<DecryptionGrant> {
        let now = self.clock.now();
        let mut memo = self.memo.lock().await;
        let grants = memo.get_mut(user)?;
        grants.retain(|grant| grant.is_valid_at(now));
        grants.iter().find(|grant| grant.covers(scope)).cloned()
    }

    async fn remember(&self, grant: DecryptionGrant) {
        let mut memo = self.memo.lock().await;
        let grants = memo.entry(grant.user_address).or_default();
        grants.retain(|cached| cached.contract_scope != grant.contract_scope);
        grants.push(grant);
    }

    async fn load_persisted(
        &self,
        key: &str,
        user: &Address,
        scope: &[LedgerAddress],
    ) -> Option<DecryptionGrant> {
        let json = match self.store.get_item(key).await {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(err) => {
                warn!(%err, "grant storage unreadable; treating as absent");
                return None;
            }
        };
        let grant: DecryptionGrant = match serde_json::from_str(&json) {
            Ok(grant) => grant,
            Err(err) => {
                warn!(%err, "discarding malformed stored grant");
                self.discard(key).await;
                return None;
            }
        };
        if grant.user_address != *user || grant.contract_scope != scope {
            warn!("stored grant does not match its key");
            return None;
        }
        if !grant.is_valid_at(self.clock.now()) {
            debug!(expired_at = grant.expires_at(), "stored grant expired");
            self.discard(key).await;
            return None;
        }
        if let Err(err) = grant.verify_signature() {
            warn!(%err, "discarding stored grant with bad signature");
            self.discard(key).await;
            return None;
        }
        Some(grant)
    }

    async fn discard(&self, key: &str) {
        if let Err(err) = self.store.remove_item(key).await {
            warn!(%err, "failed to remove stored grant");
        }
    }
}
