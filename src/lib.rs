//! Confidential bill ledger with homomorphic aggregation.
//!
//! Bill amounts are recorded as encrypted handles. The ledger keeps per-owner
//! bill lists and folds every new amount into global, per-category and
//! per-month running totals through the encryption engine's ciphertext
//! addition, so no component on the ledger side ever sees a plaintext.
//! Owners read their amounts back by signing a time-bounded decryption
//! grant that a remote oracle checks before answering.
//!
//! Layout:
//! - [`core`]: data types, errors and clocks
//! - [`engine`]: encryption engine and decryption oracle seams, plus an
//!   in-process coprocessor
//! - [`ledger`]: handle store, bill ledger and aggregation
//! - [`auth`]: grant signing, caching and persistence
//! - [`decrypt`]: batched, cached decryption
//! - [`session`]: staleness detection for suspended operations
//! - [`sdk`]: the client facade used by applications and the CLI
//!
//! Notes:
//! - Months are fixed 30-day buckets counted from the Unix epoch.
//! - The all-zero handle means "no value" and decrypts to 0 locally.

pub mod auth;
pub mod cli;
pub mod config;
mod constants;
pub mod core;
pub mod decrypt;
pub mod engine;
pub mod ledger;
pub mod sdk;
pub mod session;

pub use crate::core::clock::{Clock, ManualClock, SystemClock};
pub use crate::core::errors::LedgerError;
pub use crate::core::types::{
    Address, AggregateScope, Bill, BillMeta, ClearValue, EncryptedHandle, EncryptedInput,
    LedgerAddress, ZERO_HANDLE,
};
pub use auth::{
    DecryptionGrant, FileStore, GrantManager, GrantMessage, GrantSigner, InMemoryStore,
    KeyValueStore, LocalSigner,
};
pub use config::ClientConfig;
pub use constants::*;
pub use decrypt::DecryptionBatcher;
pub use engine::{
    DecryptionOracle, EncryptionEngine, HandleScopePair, InMemoryCoprocessor, UserDecryptRequest,
};
pub use ledger::{month_index, AggregationEngine, HandleStore, ShadowLedger, SharedLedger};
pub use sdk::{
    amount_to_cents, format_cents, BillView, BillsPhase, CategoryTotal, DecryptionPhase,
    LedgerClient, StatisticsPhase,
};
pub use session::{SessionContext, SessionHandle, StalenessGuard};
