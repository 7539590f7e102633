//! Decryption Phase API - turning handles back into cents.
//!
//! Every entry point follows the same order: reject if a decryption is
//! already running, answer zero handles and cache hits locally, and only then
//! ask for a grant and go to the oracle.

use std::collections::HashMap;

use tracing::{debug, instrument};

use super::LedgerClient;
use crate::{AggregateScope, EncryptedHandle, LedgerError};

/// Decryption Phase API.
///
/// # Example
///
/// ```no_run
/// # async fn run(client: &shadow_ledger::LedgerClient) -> Result<(), shadow_ledger::LedgerError> {
/// let bills = client.bills().refresh_bills()?;
/// let handles: Vec<_> = bills.iter().map(|bill| bill.amount_handle).collect();
/// let cents = client.decryption().decrypt_bills(&handles).await?;
/// # Ok(())
/// # }
/// ```
pub struct DecryptionPhase<'a> {
    client: &'a LedgerClient,
}

impl<'a> DecryptionPhase<'a> {
    pub(crate) fn new(client: &'a LedgerClient) -> Self {
        Self { client }
    }

    /// Decrypts a single handle.
    ///
    /// Returns `Ok(None)` when another decryption is in flight, when the user
    /// declines to sign a grant, or when the oracle leaves the handle out.
    /// The zero handle yields `Some(0)` without contacting the oracle.
    #[instrument(level = "info", skip_all, fields(handle = %handle.short()))]
    pub async fn decrypt_bill(&self, handle: &EncryptedHandle) -> Result<Option<u64>, LedgerError> {
        let batcher = &self.client.batcher;
        let Some(busy) = batcher.try_acquire() else {
            debug!("decryption already in progress; request dropped");
            return Ok(None);
        };
        if handle.is_zero() {
            return Ok(Some(0));
        }
        if let Some(value) = batcher.cached(handle)? {
            return Ok(Some(value));
        }

        let staleness = self.client.session.guard();
        let Some(grant) = self.client.grant(&staleness).await? else {
            return Ok(None);
        };
        let values = batcher
            .resolve_held(&busy, std::slice::from_ref(handle), &grant, &staleness)
            .await?;
        Ok(values.get(handle).copied())
    }

    /// Decrypts many handles with at most one oracle round trip.
    ///
    /// Returns an empty map when another decryption is in flight. If the user
    /// declines to sign, the locally known values (zero handles and cache
    /// hits) are still returned, not an empty map. Compare the result against
    /// the requested handles to tell a decline from a full answer.
    #[instrument(level = "info", skip_all, fields(requested = handles.len()))]
    pub async fn decrypt_bills(
        &self,
        handles: &[EncryptedHandle],
    ) -> Result<HashMap<EncryptedHandle, u64>, LedgerError> {
        let batcher = &self.client.batcher;
        let Some(busy) = batcher.try_acquire() else {
            debug!("decryption already in progress; request dropped");
            return Ok(HashMap::new());
        };
        let local = batcher.resolve_local(handles)?;
        if local.is_complete() {
            return Ok(local.resolved);
        }

        let staleness = self.client.session.guard();
        let Some(grant) = self.client.grant(&staleness).await? else {
            return Ok(local.resolved);
        };
        batcher.resolve_held(&busy, handles, &grant, &staleness).await
    }

    /// Decrypts the current signer's running total.
    pub async fn decrypt_total(&self) -> Result<Option<u64>, LedgerError> {
        let owner = self.client.address();
        self.decrypt_scope(&AggregateScope::Global(owner)).await
    }

    /// Decrypts the current signer's total for one category.
    pub async fn decrypt_category_total(&self, category: &str) -> Result<Option<u64>, LedgerError> {
        let owner = self.client.address();
        self.decrypt_scope(&AggregateScope::Category(owner, category.to_string()))
            .await
    }

    /// Decrypts the current signer's total for one 30-day bucket.
    pub async fn decrypt_month_total(&self, month: u64) -> Result<Option<u64>, LedgerError> {
        let owner = self.client.address();
        self.decrypt_scope(&AggregateScope::Month(owner, month)).await
    }

    /// Decrypts the total for any scope. Totals of other owners are readable
    /// as handles but the oracle refuses them without that owner's grant.
    pub async fn decrypt_scope(&self, scope: &AggregateScope) -> Result<Option<u64>, LedgerError> {
        let handle = self.client.read_ledger()?.total_for(scope);
        self.decrypt_bill(&handle).await
    }

    /// Whether a decryption is in flight.
    pub fn is_decrypting(&self) -> bool {
        self.client.batcher.is_busy()
    }

    /// Previously decrypted value of `handle`, if any.
    pub fn cached(&self, handle: &EncryptedHandle) -> Result<Option<u64>, LedgerError> {
        if handle.is_zero() {
            return Ok(Some(0));
        }
        self.client.batcher.cached(handle)
    }
}
