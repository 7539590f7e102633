//! Decryption request batching.
//!
//! The batcher turns a list of handles into plaintexts with as few oracle
//! round trips as possible: zero handles resolve to 0 locally, previously
//! resolved handles come from the cache, and everything else goes to the
//! oracle in a single request. Only one batch may be in flight at a time;
//! overlapping requests are rejected instead of queued.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, instrument, warn};

use crate::auth::DecryptionGrant;
use crate::engine::{DecryptionOracle, HandleScopePair, UserDecryptRequest};
use crate::session::StalenessGuard;
use crate::{ClearValue, EncryptedHandle, LedgerAddress, LedgerError};

/// Proof that the caller holds the batcher's single in-flight slot.
/// Dropping it releases the slot.
#[derive(Debug)]
pub struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    pub(crate) fn claim(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| BusyGuard { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Result of the local pass: what is already known and what still needs the oracle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LocalResolution {
    pub resolved: HashMap<EncryptedHandle, u64>,
    pub pending: Vec<EncryptedHandle>,
}

impl LocalResolution {
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }
}

pub struct DecryptionBatcher {
    oracle: Arc<dyn DecryptionOracle>,
    ledger: LedgerAddress,
    resolved: Mutex<HashMap<EncryptedHandle, u64>>,
    busy: AtomicBool,
}

impl DecryptionBatcher {
    pub fn new(oracle: Arc<dyn DecryptionOracle>, ledger: LedgerAddress) -> Self {
        Self {
            oracle,
            ledger,
            resolved: Mutex::new(HashMap::new()),
            busy: AtomicBool::new(false),
        }
    }

    pub fn ledger(&self) -> LedgerAddress {
        self.ledger
    }

    /// Claims the in-flight slot, or `None` if a batch is already running.
    pub fn try_acquire(&self) -> Option<BusyGuard<'_>> {
        BusyGuard::claim(&self.busy)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn cache(&self) -> Result<MutexGuard<'_, HashMap<EncryptedHandle, u64>>, LedgerError> {
        self.resolved
            .lock()
            .map_err(|_| LedgerError::LockPoisoned("decryption cache"))
    }

    pub fn cached(&self, handle: &EncryptedHandle) -> Result<Option<u64>, LedgerError> {
        Ok(self.cache()?.get(handle).copied())
    }

    pub fn clear_cache(&self) -> Result<(), LedgerError> {
        self.cache()?.clear();
        Ok(())
    }

    /// Resolves zero handles and cache hits; returns the remaining unique handles
    /// in first-seen order.
    pub fn resolve_local(&self, handles: &[EncryptedHandle]) -> Result<LocalResolution, LedgerError> {
        let cache = self.cache()?;
        let mut out = LocalResolution::default();
        let mut seen = HashSet::new();
        for handle in handles {
            if handle.is_zero() {
                out.resolved.insert(*handle, 0);
            } else if let Some(value) = cache.get(handle) {
                out.resolved.insert(*handle, *value);
            } else if seen.insert(*handle) {
                out.pending.push(*handle);
            }
        }
        Ok(out)
    }

    /// Whether resolving `handles` would need an oracle round trip.
    pub fn needs_oracle(&self, handles: &[EncryptedHandle]) -> Result<bool, LedgerError> {
        Ok(!self.resolve_local(handles)?.is_complete())
    }

    /// Resolves `handles` under `grant`.
    ///
    /// Returns an empty map without doing anything if another batch is in flight.
    pub async fn resolve(
        &self,
        handles: &[EncryptedHandle],
        grant: &DecryptionGrant,
        staleness: &StalenessGuard,
    ) -> Result<HashMap<EncryptedHandle, u64>, LedgerError> {
        let Some(busy) = self.try_acquire() else {
            debug!("decryption already in progress; request dropped");
            return Ok(HashMap::new());
        };
        self.resolve_held(&busy, handles, grant, staleness).await
    }

    /// Single-handle form of [`DecryptionBatcher::resolve`]. `None` when busy.
    pub async fn resolve_one(
        &self,
        handle: &EncryptedHandle,
        grant: &DecryptionGrant,
        staleness: &StalenessGuard,
    ) -> Result<Option<u64>, LedgerError> {
        let Some(busy) = self.try_acquire() else {
            debug!("decryption already in progress; request dropped");
            return Ok(None);
        };
        let values = self
            .resolve_held(&busy, std::slice::from_ref(handle), grant, staleness)
            .await?;
        Ok(values.get(handle).copied())
    }

    /// Resolves `handles` while the caller already holds the in-flight slot.
    ///
    /// Handles the oracle leaves out, or returns as booleans, are missing from
    /// the result. If the session went stale during the round trip the
    /// oracle's answer is dropped and the cache is left as it was.
    #[instrument(level = "info", skip_all, fields(requested = handles.len(), ledger = %self.ledger))]
    pub async fn resolve_held(
        &self,
        _busy: &BusyGuard<'_>,
        handles: &[EncryptedHandle],
        grant: &DecryptionGrant,
        staleness: &StalenessGuard,
    ) -> Result<HashMap<EncryptedHandle, u64>, LedgerError> {
        let LocalResolution {
            mut resolved,
            pending,
        } = self.resolve_local(handles)?;
        if pending.is_empty() {
            debug!(resolved = resolved.len(), "resolved without oracle");
            return Ok(resolved);
        }

        let pairs: Vec<HandleScopePair> = pending
            .iter()
            .map(|handle| HandleScopePair {
                handle: *handle,
                ledger: self.ledger,
            })
            .collect();
        let request = UserDecryptRequest::from(grant);
        let response = self.oracle.user_decrypt(&pairs, &request).await?;
        staleness.ensure_fresh("decryption")?;

        let mut fresh = HashMap::with_capacity(pending.len());
        for handle in &pending {
            match response.get(handle) {
                Some(ClearValue::Uint(value)) => {
                    fresh.insert(*handle, *value);
                }
                Some(ClearValue::Bool(_)) => {
                    warn!(handle = %handle.short(), "oracle returned a boolean for an amount handle");
                }
                None => {
                    warn!(handle = %handle.short(), "oracle response missing handle");
                }
            }
        }

        {
            // Freshness must be checked under the cache lock.
            let mut cache = self.cache()?;
            staleness.ensure_fresh("decryption")?;
            cache.extend(fresh.iter().map(|(h, v)| (*h, *v)));
        }
        info!(fetched = fresh.len(), "oracle results merged");
        resolved.extend(fresh);
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::engine::{EncryptionEngine, InMemoryCoprocessor};
    use crate::{Address, ZERO_HANDLE};

    fn batcher() -> (Arc<InMemoryCoprocessor>, DecryptionBatcher) {
        let engine = Arc::new(InMemoryCoprocessor::new(Arc::new(ManualClock::new(0))));
        let batcher = DecryptionBatcher::new(engine.clone(), Address::from_label("ledger"));
        (engine, batcher)
    }

    #[test]
    fn local_pass_handles_zero_and_duplicates() {
        let (engine, batcher) = batcher();
        let owner = Address::from_label("alice");
        let h = engine.encrypt(5, &owner, &batcher.ledger()).unwrap().handle;

        let local = batcher.resolve_local(&[ZERO_HANDLE, h, h]).unwrap();
        assert_eq!(local.resolved.get(&ZERO_HANDLE), Some(&0));
        assert_eq!(local.pending, vec![h]);
        assert!(!batcher.needs_oracle(&[ZERO_HANDLE]).unwrap());
    }

    #[test]
    fn only_one_slot_at_a_time() {
        let (_, batcher) = batcher();
        let first = batcher.try_acquire();
        assert!(first.is_some());
        assert!(batcher.is_busy());
        assert!(batcher.try_acquire().is_none());
        drop(first);
        assert!(!batcher.is_busy());
        assert!(batcher.try_acquire().is_some());
    }
}
