//! Bills Phase API - bill creation and listing.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{debug, instrument};

use super::statistics::BillView;
use super::{amount_to_cents, LedgerClient};
use crate::decrypt::BusyGuard;
use crate::engine::EncryptionEngine;
use crate::{Address, EncryptedInput, LedgerAddress, LedgerError};

/// Bills Phase API.
///
/// Amounts are encrypted client side; the ledger only ever sees the handle
/// and its input proof.
pub struct BillsPhase<'a> {
    client: &'a LedgerClient,
}

impl<'a> BillsPhase<'a> {
    pub(crate) fn new(client: &'a LedgerClient) -> Self {
        Self { client }
    }

    /// Encrypts `amount` (decimal currency) and appends a bill for the current signer.
    ///
    /// Returns `Ok(None)` without doing anything if another creation from this
    /// client is still in flight.
    ///
    /// # Errors
    ///
    /// - `LedgerError::InvalidInput` for a non-positive or oversized amount, or
    ///   an empty category
    /// - `LedgerError::Stale` if the session changed while the amount was being
    ///   encrypted; no bill is written
    /// - any ledger error from the append itself
    #[instrument(level = "info", skip_all, fields(category = %category))]
    pub async fn create_bill(
        &self,
        amount: f64,
        category: &str,
        description: &str,
    ) -> Result<Option<u32>, LedgerError> {
        let Some(_creating) = BusyGuard::claim(&self.client.creating) else {
            debug!("bill creation already in progress; request dropped");
            return Ok(None);
        };

        let cents = amount_to_cents(amount)?;
        let category = category.trim();
        if category.is_empty() {
            return Err(LedgerError::InvalidInput("category must not be empty".into()));
        }

        let staleness = self.client.session.guard();
        let owner = staleness.snapshot().signer;
        let ledger = self.client.ledger_address;
        let input = self.encrypt(cents, owner, ledger).await?;
        staleness.ensure_fresh("bill encryption")?;

        let index = self
            .client
            .write_ledger()?
            .create_bill(owner, &input, category, description.trim())?;
        Ok(Some(index))
    }

    async fn encrypt(
        &self,
        cents: u64,
        owner: Address,
        ledger: LedgerAddress,
    ) -> Result<EncryptedInput, LedgerError> {
        let engine: Arc<dyn EncryptionEngine> = Arc::clone(&self.client.engine);
        // Proof generation is blocking work.
        tokio::task::spawn_blocking(move || engine.encrypt(cents, &owner, &ledger))
            .await
            .map_err(|err| LedgerError::Engine(format!("encryption task failed: {err}")))?
    }

    /// Whether a creation is in flight.
    pub fn is_creating(&self) -> bool {
        self.client.creating.load(Ordering::Acquire)
    }

    /// Number of bills the current signer has created.
    pub fn count(&self) -> Result<u32, LedgerError> {
        let owner = self.client.address();
        Ok(self.client.read_ledger()?.bill_count(&owner))
    }

    /// All bills of the current signer, in creation order.
    pub fn refresh_bills(&self) -> Result<Vec<BillView>, LedgerError> {
        let owner = self.client.address();
        let ledger = self.client.read_ledger()?;
        Ok(ledger.bills(&owner).iter().map(BillView::from).collect())
    }
}
