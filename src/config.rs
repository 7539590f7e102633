//! Client configuration.
//!
//! Loaded from a JSON file; every field has a default so a partial file (or
//! none at all) is fine. CLI flags override file values.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::auth::{FileStore, InMemoryStore, KeyValueStore};
use crate::constants::{DEFAULT_GRANT_DURATION_DAYS, MAX_GRANT_DURATION_DAYS};
use crate::{Address, LedgerAddress, LedgerError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Ledger instance the client talks to.
    pub ledger_address: LedgerAddress,
    pub chain_id: u64,
    /// Validity of newly signed decryption grants.
    pub grant_duration_days: u64,
    /// Where grants are persisted. Grants live in memory only when unset.
    pub storage_dir: Option<PathBuf>,
    /// `tracing` filter used when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ledger_address: Address::from_label("shadow-ledger"),
            chain_id: 31_337,
            grant_duration_days: DEFAULT_GRANT_DURATION_DAYS,
            storage_dir: None,
            log_filter: "info".to_string(),
        }
    }
}

impl ClientConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.grant_duration_days == 0 || self.grant_duration_days > MAX_GRANT_DURATION_DAYS {
            return Err(LedgerError::InvalidConfig(format!(
                "grant_duration_days must be 1..={MAX_GRANT_DURATION_DAYS}, got {}",
                self.grant_duration_days
            )));
        }
        if self.ledger_address == Address::ZERO {
            return Err(LedgerError::InvalidConfig(
                "ledger_address must not be the zero address".into(),
            ));
        }
        Ok(())
    }

    /// Grant store selected by `storage_dir`.
    pub fn grant_store(&self) -> Arc<dyn KeyValueStore> {
        match &self.storage_dir {
            Some(dir) => Arc::new(FileStore::new(dir.clone())),
            None => Arc::new(InMemoryStore::new()),
        }
    }
}
