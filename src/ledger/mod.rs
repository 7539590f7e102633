//! The confidential ledger.
//!
//! `ShadowLedger` keeps an append-only bill list per owner and the encrypted
//! running totals derived from it. Bill creation is all-or-nothing: the proof
//! check, the three additions and the access grants all run before any state
//! changes.
//!
//! # Submodules
//!
//! - `handle_store`: proof-checked admission of encrypted inputs
//! - `aggregation`: running totals per scope and month bucketing

pub mod aggregation;
pub mod handle_store;

pub use aggregation::{month_index, scopes_for, AggregationEngine};
pub use handle_store::HandleStore;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{info, instrument};

use crate::core::clock::Clock;
use crate::engine::EncryptionEngine;
use crate::{
    Address, AggregateScope, Bill, BillMeta, EncryptedHandle, EncryptedInput, LedgerAddress,
    LedgerError,
};

/// Ledger shared between clients in one process.
pub type SharedLedger = Arc<RwLock<ShadowLedger>>;

pub struct ShadowLedger {
    address: LedgerAddress,
    engine: Arc<dyn EncryptionEngine>,
    clock: Arc<dyn Clock>,
    handles: HandleStore,
    bills: HashMap<Address, Vec<Bill>>,
    aggregates: AggregationEngine,
}

impl ShadowLedger {
    pub fn new(
        address: LedgerAddress,
        engine: Arc<dyn EncryptionEngine>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            address,
            handles: HandleStore::new(address, engine.clone()),
            aggregates: AggregationEngine::new(engine.clone()),
            engine,
            clock,
            bills: HashMap::new(),
        }
    }

    pub fn shared(self) -> SharedLedger {
        Arc::new(RwLock::new(self))
    }

    pub fn address(&self) -> LedgerAddress {
        self.address
    }

    /// Appends a bill for `owner` and folds its amount into the global,
    /// category and month totals. Returns the new bill's index.
    #[instrument(
        level = "info",
        skip_all,
        fields(%owner, handle = %input.handle.short(), category = %category)
    )]
    pub fn create_bill(
        &mut self,
        owner: Address,
        input: &EncryptedInput,
        category: &str,
        description: &str,
    ) -> Result<u32, LedgerError> {
        self.handles.verify(&owner, input)?;

        let index = self.bill_count(&owner);
        if index == u32::MAX {
            return Err(LedgerError::InvalidInput(format!("{owner} has too many bills")));
        }
        let timestamp = self.clock.now();
        let amount = input.handle;

        let scopes = scopes_for(owner, category, timestamp);
        let updates = self.aggregates.plan(&scopes, &amount)?;

        for handle in std::iter::once(&amount).chain(updates.iter().map(|(_, total)| total)) {
            self.engine.allow(handle, &owner)?;
            self.engine.allow(handle, &self.address)?;
        }

        self.handles.record(owner, amount);
        self.bills.entry(owner).or_default().push(Bill {
            owner,
            index,
            amount_handle: amount,
            category: category.to_string(),
            description: description.to_string(),
            timestamp,
        });
        self.aggregates.apply(updates);

        info!(index, timestamp, "bill created");
        Ok(index)
    }

    /// Number of bills `owner` has created; 0 for unknown owners.
    pub fn bill_count(&self, owner: &Address) -> u32 {
        self.bills
            .get(owner)
            .map(|bills| bills.len() as u32)
            .unwrap_or(0)
    }

    pub fn bill_record(&self, owner: &Address, index: u32) -> Result<&Bill, LedgerError> {
        self.bills
            .get(owner)
            .and_then(|bills| bills.get(index as usize))
            .ok_or(LedgerError::BillNotFound {
                owner: *owner,
                index,
                count: self.bill_count(owner),
            })
    }

    /// Amount handle of a bill. Readable by anyone; decrypting it needs the owner's grant.
    pub fn bill(&self, owner: &Address, index: u32) -> Result<EncryptedHandle, LedgerError> {
        self.bill_record(owner, index).map(|bill| bill.amount_handle)
    }

    pub fn bill_meta(&self, owner: &Address, index: u32) -> Result<BillMeta, LedgerError> {
        self.bill_record(owner, index).map(Bill::meta)
    }

    pub fn bills(&self, owner: &Address) -> &[Bill] {
        self.bills.get(owner).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total_for(&self, scope: &AggregateScope) -> EncryptedHandle {
        self.aggregates.total_for(scope)
    }

    pub fn total_amount(&self, owner: &Address) -> EncryptedHandle {
        self.total_for(&AggregateScope::Global(*owner))
    }

    pub fn total_by_category(&self, owner: &Address, category: &str) -> EncryptedHandle {
        self.total_for(&AggregateScope::Category(*owner, category.to_string()))
    }

    pub fn total_by_month(&self, owner: &Address, month: u64) -> EncryptedHandle {
        self.total_for(&AggregateScope::Month(*owner, month))
    }

    /// Handles accepted so far across all owners.
    pub fn accepted_handles(&self) -> usize {
        self.handles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::engine::InMemoryCoprocessor;

    struct Fixture {
        engine: Arc<InMemoryCoprocessor>,
        clock: ManualClock,
        ledger: ShadowLedger,
    }

    fn fixture() -> Fixture {
        let clock = ManualClock::new(1_700_000_000);
        let engine = Arc::new(InMemoryCoprocessor::new(Arc::new(clock.clone())));
        let ledger = ShadowLedger::new(
            Address::from_label("ledger"),
            engine.clone(),
            Arc::new(clock.clone()),
        );
        Fixture {
            engine,
            clock,
            ledger,
        }
    }

    #[test]
    fn indices_are_dense_per_owner() {
        let mut f = fixture();
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        let at = f.ledger.address();

        for expected in 0..3 {
            let input = f.engine.encrypt(100, &alice, &at).unwrap();
            assert_eq!(
                f.ledger.create_bill(alice, &input, "Food", "x").unwrap(),
                expected
            );
        }
        let input = f.engine.encrypt(100, &bob, &at).unwrap();
        assert_eq!(f.ledger.create_bill(bob, &input, "Food", "y").unwrap(), 0);
        assert_eq!(f.ledger.bill_count(&alice), 3);
        assert_eq!(f.ledger.bill_count(&bob), 1);
    }

    #[test]
    fn out_of_range_read_reports_count() {
        let mut f = fixture();
        let alice = Address::from_label("alice");
        let at = f.ledger.address();
        for _ in 0..2 {
            let input = f.engine.encrypt(1, &alice, &at).unwrap();
            f.ledger.create_bill(alice, &input, "Food", "").unwrap();
        }

        match f.ledger.bill(&alice, 5).unwrap_err() {
            LedgerError::BillNotFound { index, count, .. } => {
                assert_eq!(index, 5);
                assert_eq!(count, 2);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(f.ledger.bill_count(&Address::from_label("nobody")), 0);
    }

    #[test]
    fn failed_creation_changes_nothing() {
        let mut f = fixture();
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        let at = f.ledger.address();
        let input = f.engine.encrypt(100, &alice, &at).unwrap();

        assert!(matches!(
            f.ledger.create_bill(bob, &input, "Food", "stolen"),
            Err(LedgerError::InvalidProof(_))
        ));
        assert_eq!(f.ledger.bill_count(&bob), 0);
        assert!(f.ledger.total_amount(&bob).is_zero());
        assert_eq!(f.ledger.accepted_handles(), 0);
    }

    #[test]
    fn metadata_is_stamped_with_clock_time() {
        let mut f = fixture();
        let alice = Address::from_label("alice");
        let at = f.ledger.address();
        f.clock.set(1_800_000_000);
        let input = f.engine.encrypt(2_500, &alice, &at).unwrap();
        let index = f.ledger.create_bill(alice, &input, "Travel", "Taxi").unwrap();

        let meta = f.ledger.bill_meta(&alice, index).unwrap();
        assert_eq!(meta.category, "Travel");
        assert_eq!(meta.description, "Taxi");
        assert_eq!(meta.timestamp, 1_800_000_000);
        assert!(!f
            .ledger
            .total_by_month(&alice, month_index(1_800_000_000))
            .is_zero());
        assert!(f
            .ledger
            .total_by_month(&alice, month_index(1_800_000_000) + 1)
            .is_zero());
    }
}
