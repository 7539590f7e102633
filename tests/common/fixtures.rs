//! Test fixtures for common test scenarios.

use std::sync::Arc;
use std::time::Duration;

use shadow_ledger::*;

/// Block time the fixture clock starts at.
pub const START_TIME: u64 = 1_700_000_000;
pub const CHAIN_ID: u64 = 31_337;

/// Test fixture containing one ledger, its coprocessor and a shared grant manager
pub struct LedgerFixture {
    pub clock: ManualClock,
    pub engine: Arc<InMemoryCoprocessor>,
    pub ledger: SharedLedger,
    pub store: Arc<dyn KeyValueStore>,
    pub grants: Arc<GrantManager>,
}

impl LedgerFixture {
    /// Creates a fixture with an in-memory grant store and 365-day grants
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()))
    }

    /// Creates a fixture persisting grants to `store`
    pub fn with_store(store: Arc<dyn KeyValueStore>) -> Self {
        let clock = ManualClock::new(START_TIME);
        let engine = Arc::new(InMemoryCoprocessor::new(Arc::new(clock.clone())));
        let ledger = ShadowLedger::new(
            Address::from_label("shadow-ledger"),
            engine.clone(),
            Arc::new(clock.clone()),
        )
        .shared();
        let grants = Arc::new(
            GrantManager::new(
                store.clone(),
                Arc::new(clock.clone()),
                DEFAULT_GRANT_DURATION_DAYS,
            )
            .expect("valid grant duration"),
        );
        Self {
            clock,
            engine,
            ledger,
            store,
            grants,
        }
    }

    /// Client for `signer` sharing this fixture's ledger, engine and grants
    pub fn client(&self, signer: Arc<LocalSigner>) -> LedgerClient {
        self.client_with_grants(signer, self.grants.clone())
    }

    pub fn client_with_grants(
        &self,
        signer: Arc<LocalSigner>,
        grants: Arc<GrantManager>,
    ) -> LedgerClient {
        LedgerClient::new(
            self.ledger.clone(),
            self.engine.clone(),
            self.engine.clone(),
            signer,
            grants,
            CHAIN_ID,
        )
        .expect("client construction")
    }

    /// A fresh grant manager over the same store, as after a process restart
    pub fn restarted_grants(&self) -> Arc<GrantManager> {
        Arc::new(
            GrantManager::new(
                self.store.clone(),
                Arc::new(self.clock.clone()),
                DEFAULT_GRANT_DURATION_DAYS,
            )
            .expect("valid grant duration"),
        )
    }

    pub fn ledger_address(&self) -> LedgerAddress {
        self.ledger.read().expect("ledger lock").address()
    }
}

impl Default for LedgerFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Signer that approves immediately
pub fn signer() -> Arc<LocalSigner> {
    Arc::new(LocalSigner::random())
}

/// Signer that keeps the approval prompt open for `millis` milliseconds
pub fn slow_signer(millis: u64) -> Arc<LocalSigner> {
    Arc::new(LocalSigner::random().with_approval_delay(Duration::from_millis(millis)))
}
