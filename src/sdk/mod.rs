//! # Shadow Ledger SDK
//!
//! Client-side API for recording confidential bills and reading them back.
//!
//! ## Architecture Overview
//!
//! A [`LedgerClient`] holds one user's session against one ledger instance and
//! exposes three phase APIs:
//!
//! 1. **Bills**: encrypt decimal amounts and append bills, list the user's bills
//! 2. **Decryption**: turn bill and total handles back into cents under a
//!    signed grant, one oracle round trip per batch
//! 3. **Statistics**: category breakdowns built from the bill list and
//!    batched category-total decryption
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use shadow_ledger::{
//!     Address, GrantManager, InMemoryCoprocessor, InMemoryStore, LedgerClient, LocalSigner,
//!     ManualClock, ShadowLedger,
//! };
//!
//! # async fn run() -> Result<(), shadow_ledger::LedgerError> {
//! let clock = ManualClock::new(1_700_000_000);
//! let engine = Arc::new(InMemoryCoprocessor::new(Arc::new(clock.clone())));
//! let ledger =
//!     ShadowLedger::new(Address::from_label("ledger"), engine.clone(), Arc::new(clock.clone()))
//!         .shared();
//! let grants = Arc::new(GrantManager::new(
//!     Arc::new(InMemoryStore::new()),
//!     Arc::new(clock.clone()),
//!     365,
//! )?);
//! let client = LedgerClient::new(
//!     ledger,
//!     engine.clone(),
//!     engine,
//!     Arc::new(LocalSigner::random()),
//!     grants,
//!     1,
//! )?;
//!
//! client.bills().create_bill(12.50, "Food", "Lunch").await?;
//! let total = client.decryption().decrypt_total().await?;
//! # Ok(())
//! # }
//! ```

pub mod amount;
pub mod bills;
pub mod decryption;
pub mod statistics;

pub use amount::{amount_to_cents, format_cents};
pub use bills::BillsPhase;
pub use decryption::DecryptionPhase;
pub use statistics::{distinct_categories, BillView, CategoryTotal, StatisticsPhase};

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::info;

use crate::auth::{DecryptionGrant, GrantManager, GrantSigner};
use crate::decrypt::DecryptionBatcher;
use crate::engine::{DecryptionOracle, EncryptionEngine};
use crate::ledger::{ShadowLedger, SharedLedger};
use crate::session::{SessionContext, SessionHandle, StalenessGuard};
use crate::{Address, LedgerAddress, LedgerError};

/// Main SDK entry point: one user's view of one ledger instance.
pub struct LedgerClient {
    ledger: SharedLedger,
    ledger_address: LedgerAddress,
    engine: Arc<dyn EncryptionEngine>,
    signer: RwLock<Arc<dyn GrantSigner>>,
    grants: Arc<GrantManager>,
    batcher: DecryptionBatcher,
    session: SessionHandle,
    creating: AtomicBool,
}

impl LedgerClient {
    /// Creates a client for `signer` on `ledger`.
    ///
    /// `grants` may be shared between clients so that one signature serves
    /// every client of the same user.
    pub fn new(
        ledger: SharedLedger,
        engine: Arc<dyn EncryptionEngine>,
        oracle: Arc<dyn DecryptionOracle>,
        signer: Arc<dyn GrantSigner>,
        grants: Arc<GrantManager>,
        chain_id: u64,
    ) -> Result<Self, LedgerError> {
        let ledger_address = ledger
            .read()
            .map_err(|_| LedgerError::LockPoisoned("ledger"))?
            .address();
        let session = SessionHandle::new(SessionContext {
            chain_id,
            signer: signer.address(),
            ledger: ledger_address,
        });
        Ok(Self {
            batcher: DecryptionBatcher::new(oracle, ledger_address),
            ledger,
            ledger_address,
            engine,
            signer: RwLock::new(signer),
            grants,
            session,
            creating: AtomicBool::new(false),
        })
    }

    /// Access the Bills Phase API for bill creation and listing.
    pub fn bills(&self) -> BillsPhase<'_> {
        BillsPhase::new(self)
    }

    /// Access the Decryption Phase API for bill and total decryption.
    pub fn decryption(&self) -> DecryptionPhase<'_> {
        DecryptionPhase::new(self)
    }

    /// Access the Statistics Phase API for category breakdowns.
    pub fn statistics(&self) -> StatisticsPhase<'_> {
        StatisticsPhase::new(self)
    }

    pub fn ledger_address(&self) -> LedgerAddress {
        self.ledger_address
    }

    /// Address of the current signer.
    pub fn address(&self) -> Address {
        self.session.current().signer
    }

    pub fn session(&self) -> SessionContext {
        self.session.current()
    }

    /// Replaces the signer. In-flight operations for the previous signer are
    /// discarded and cached plaintexts are dropped.
    pub fn switch_signer(&self, signer: Arc<dyn GrantSigner>) -> Result<(), LedgerError> {
        let address = signer.address();
        *self
            .signer
            .write()
            .map_err(|_| LedgerError::LockPoisoned("signer"))? = signer;
        let mut context = self.session.current();
        context.signer = address;
        // Publish before clearing; merges re-check freshness under the cache lock.
        self.session.switch(context);
        self.batcher.clear_cache()?;
        info!(%address, "signer switched");
        Ok(())
    }

    /// Moves the session to another chain. In-flight operations are discarded.
    pub fn switch_chain(&self, chain_id: u64) {
        let mut context = self.session.current();
        context.chain_id = chain_id;
        self.session.switch(context);
    }

    pub(crate) fn signer(&self) -> Result<Arc<dyn GrantSigner>, LedgerError> {
        self.signer
            .read()
            .map(|signer| signer.clone())
            .map_err(|_| LedgerError::LockPoisoned("signer"))
    }

    pub(crate) fn read_ledger(&self) -> Result<RwLockReadGuard<'_, ShadowLedger>, LedgerError> {
        self.ledger
            .read()
            .map_err(|_| LedgerError::LockPoisoned("ledger"))
    }

    pub(crate) fn write_ledger(&self) -> Result<RwLockWriteGuard<'_, ShadowLedger>, LedgerError> {
        self.ledger
            .write()
            .map_err(|_| LedgerError::LockPoisoned("ledger"))
    }

    /// Loads or signs a grant for this ledger, then re-checks the session.
    pub(crate) async fn grant(
        &self,
        staleness: &StalenessGuard,
    ) -> Result<Option<DecryptionGrant>, LedgerError> {
        let signer = self.signer()?;
        let grant = self
            .grants
            .load_or_sign(signer.as_ref(), &[self.ledger_address])
            .await?;
        staleness.ensure_fresh("grant signing")?;
        Ok(grant)
    }
}
