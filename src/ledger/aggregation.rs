//! Encrypted running totals.
//!
//! Each [`AggregateScope`] maps to the handle that currently represents its
//! total. Totals only move forward through the engine's addition; nothing
//! here ever sees a plaintext.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{instrument, trace};

use crate::constants::SECONDS_PER_30_DAY_MONTH;
use crate::engine::EncryptionEngine;
use crate::{Address, AggregateScope, EncryptedHandle, LedgerError, ZERO_HANDLE};

/// Fixed 30-day bucket that `timestamp` falls into. Not a calendar month.
pub fn month_index(timestamp: u64) -> u64 {
    timestamp / SECONDS_PER_30_DAY_MONTH
}

/// The three scopes a bill contributes to.
pub fn scopes_for(owner: Address, category: &str, timestamp: u64) -> [AggregateScope; 3] {
    [
        AggregateScope::Global(owner),
        AggregateScope::Category(owner, category.to_string()),
        AggregateScope::Month(owner, month_index(timestamp)),
    ]
}

pub struct AggregationEngine {
    engine: Arc<dyn EncryptionEngine>,
    totals: HashMap<AggregateScope, EncryptedHandle>,
}

impl AggregationEngine {
    pub fn new(engine: Arc<dyn EncryptionEngine>) -> Self {
        Self {
            engine,
            totals: HashMap::new(),
        }
    }

    /// Current total for `scope`; the zero handle if nothing was ever folded in.
    pub fn total_for(&self, scope: &AggregateScope) -> EncryptedHandle {
        self.totals.get(scope).copied().unwrap_or(ZERO_HANDLE)
    }

    /// Adds `amount` into the total for `scope` and returns the new total handle.
    #[instrument(level = "debug", skip_all, fields(?scope, amount = %amount.short()))]
    pub fn fold(
        &mut self,
        scope: AggregateScope,
        amount: &EncryptedHandle,
    ) -> Result<EncryptedHandle, LedgerError> {
        let total = self.engine.add(&self.total_for(&scope), amount)?;
        self.totals.insert(scope, total);
        Ok(total)
    }

    /// Computes the new totals for `scopes` without storing them.
    ///
    /// Paired with [`AggregationEngine::apply`] so a caller can stage every
    /// addition first and commit only once all of them succeeded.
    pub(crate) fn plan(
        &self,
        scopes: &[AggregateScope],
        amount: &EncryptedHandle,
    ) -> Result<Vec<(AggregateScope, EncryptedHandle)>, LedgerError> {
        scopes
            .iter()
            .map(|scope| {
                let total = self.engine.add(&self.total_for(scope), amount)?;
                Ok((scope.clone(), total))
            })
            .collect()
    }

    pub(crate) fn apply(&mut self, updates: Vec<(AggregateScope, EncryptedHandle)>) {
        for (scope, total) in updates {
            trace!(?scope, total = %total.short(), "aggregate updated");
            self.totals.insert(scope, total);
        }
    }

    /// Number of scopes that have received at least one contribution.
    pub fn touched(&self) -> usize {
        self.totals.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::engine::InMemoryCoprocessor;
    use proptest::prelude::*;

    #[test]
    fn untouched_scope_is_zero_handle() {
        let engine = Arc::new(InMemoryCoprocessor::new(Arc::new(ManualClock::new(0))));
        let aggregates = AggregationEngine::new(engine);
        let owner = Address::from_label("alice");
        assert!(aggregates.total_for(&AggregateScope::Global(owner)).is_zero());
        assert_eq!(aggregates.touched(), 0);
    }

    #[test]
    fn plan_leaves_totals_untouched_until_applied() {
        let engine = Arc::new(InMemoryCoprocessor::new(Arc::new(ManualClock::new(0))));
        let owner = Address::from_label("alice");
        let ledger = Address::from_label("ledger");
        let amount = engine.encrypt(10, &owner, &ledger).unwrap().handle;
        let mut aggregates = AggregationEngine::new(engine);

        let scopes = scopes_for(owner, "Food", 0);
        let updates = aggregates.plan(&scopes, &amount).unwrap();
        assert_eq!(updates.len(), 3);
        assert_eq!(aggregates.touched(), 0);

        aggregates.apply(updates);
        assert_eq!(aggregates.touched(), 3);
        assert!(!aggregates.total_for(&scopes[1]).is_zero());
    }

    #[test]
    fn month_boundary_is_exact() {
        assert_eq!(month_index(0), 0);
        assert_eq!(month_index(SECONDS_PER_30_DAY_MONTH - 1), 0);
        assert_eq!(month_index(SECONDS_PER_30_DAY_MONTH), 1);
    }

    proptest! {
        #[test]
        fn same_bucket_iff_same_month_index(a in 0u64..u64::MAX / 2, b in 0u64..u64::MAX / 2) {
            let same = a / SECONDS_PER_30_DAY_MONTH == b / SECONDS_PER_30_DAY_MONTH;
            prop_assert_eq!(month_index(a) == month_index(b), same);
        }

        #[test]
        fn one_second_past_bucket_end_moves_bucket(bucket in 0u64..1_000_000) {
            let last = (bucket + 1) * SECONDS_PER_30_DAY_MONTH - 1;
            prop_assert_eq!(month_index(last), bucket);
            prop_assert_eq!(month_index(last + 1), bucket + 1);
        }
    }
}
