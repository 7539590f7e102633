//! Error taxonomy for the ledger, the authorization manager and the batcher.

use thiserror::Error;

use crate::core::types::{Address, EncryptedHandle};

/// Crate-wide error type.
///
/// Ledger and aggregation errors abort only the triggering call and leave no
/// partial state behind. Authorization and decryption errors are recoverable:
/// callers are expected to surface a retry affordance.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The input proof is not bound to this ledger instance and owner.
    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    /// Read of an index at or past the owner's bill count.
    #[error("Bill not found: owner {owner} has {count} bills, requested index {index}")]
    BillNotFound {
        /// Owner whose bills were queried
        owner: Address,
        /// Requested index
        index: u32,
        /// Owner's bill count at the time of the read
        count: u32,
    },

    /// The user refused to sign a decryption grant.
    #[error("Grant declined by {0}")]
    GrantDeclined(Address),

    /// The oracle rejected a request whose grant does not cover a handle.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Transient oracle failure; the batch may be retried.
    #[error("Oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// The encryption engine failed to evaluate an operation.
    #[error("Engine error: {0}")]
    Engine(String),

    /// The engine does not know the handle.
    #[error("Unknown handle {0}")]
    UnknownHandle(EncryptedHandle),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Key-value store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// The session changed while the operation was suspended; the result was discarded.
    #[error("Stale session: {0}")]
    Stale(String),

    /// A shared lock was poisoned by a panicking holder.
    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),

    /// JSON encoding or decoding failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure outside the grant store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// Whether the error may go away by retrying the same call later.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LedgerError::GrantDeclined(_)
                | LedgerError::OracleUnavailable(_)
                | LedgerError::Stale(_)
                | LedgerError::Storage(_)
        )
    }
}
