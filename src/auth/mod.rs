//! Decryption authorization.
//!
//! Users authorize decryption by signing a time-bounded grant scoped to a set
//! of ledgers. The [`GrantManager`] caches grants in memory and in a
//! [`KeyValueStore`] so one signature serves many decryptions.
//!
//! # Submodules
//!
//! - [`grant`]: grant message, signed grant, validity and scope checks
//! - [`signer`]: the [`GrantSigner`] seam and a local key implementation
//! - [`storage`]: persistence backends
//! - [`manager`]: reuse, reload and re-sign logic

pub mod grant;
pub mod manager;
pub mod signer;
pub mod storage;

pub use grant::{DecryptionGrant, GrantMessage};
pub use manager::GrantManager;
pub use signer::{GrantSigner, LocalSigner};
pub use storage::{FileStore, InMemoryStore, KeyValueStore};
