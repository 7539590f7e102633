//! Key-value persistence for grants.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::trace;

use crate::LedgerError;

/// String-keyed store with browser-storage semantics.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, LedgerError>;

    async fn set_item(&self, key: &str, value: String) -> Result<(), LedgerError>;

    async fn remove_item(&self, key: &str) -> Result<(), LedgerError>;
}

/// Process-local store. Contents are lost on exit.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    items: Mutex<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, LedgerError> {
        Ok(self.items.lock().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: String) -> Result<(), LedgerError> {
        self.items.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), LedgerError> {
        self.items.lock().await.remove(key);
        Ok(())
    }
}

/// One file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, LedgerError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(LedgerError::Storage(format!("invalid storage key {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, LedgerError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(LedgerError::Storage(format!(
                "read {}: {err}",
                path.display()
            ))),
        }
    }

    async fn set_item(&self, key: &str, value: String) -> Result<(), LedgerError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|err| LedgerError::Storage(format!("create {}: {err}", self.dir.display())))?;
        fs::write(&path, value)
            .await
            .map_err(|err| LedgerError::Storage(format!("write {}: {err}", path.display())))?;
        trace!(path = %path.display(), "item stored");
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), LedgerError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(LedgerError::Storage(format!(
                "remove {}: {err}",
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_store_round_trips_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("grants"));

        assert_eq!(store.get_item("grant-abc").await.unwrap(), None);
        store.set_item("grant-abc", "{}".into()).await.unwrap();
        assert_eq!(
            store.get_item("grant-abc").await.unwrap().as_deref(),
            Some("{}")
        );
        store.remove_item("grant-abc").await.unwrap();
        store.remove_item("grant-abc").await.unwrap();
        assert_eq!(store.get_item("grant-abc").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        for key in ["../escape", "a/b", "", ".hidden"] {
            assert!(matches!(
                store.set_item(key, "x".into()).await,
                Err(LedgerError::Storage(_))
            ));
        }
    }

    #[tokio::test]
    async fn memory_store_overwrites() {
        let store = InMemoryStore::new();
        store.set_item("k", "1".into()).await.unwrap();
        store.set_item("k", "2".into()).await.unwrap();
        assert_eq!(store.get_item("k").await.unwrap().as_deref(), Some("2"));
        assert_eq!(store.len().await, 1);
    }
}
