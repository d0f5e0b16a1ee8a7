//! Async key-value persistence seam.
//!
//! Values are JSON documents keyed by string, mirroring the browser's
//! extension storage area the settings were originally kept in.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::error::StoreError;

/// A batch of stored entries.
pub type StoredMap = Map<String, Value>;

/// Opaque async key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the given keys. Missing keys are absent from the result.
    async fn get(&self, keys: &[&str]) -> Result<StoredMap, StoreError>;

    /// Writes every entry, replacing existing values.
    async fn set(&self, entries: StoredMap) -> Result<(), StoreError>;

    /// Removes all entries.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Process-local store used for `:memory:` runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<StoredMap>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `entries`.
    #[must_use]
    pub fn with_entries(entries: StoredMap) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    /// Copy of everything currently stored.
    #[must_use]
    pub fn snapshot(&self) -> StoredMap {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, StoredMap> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<StoredMap, StoreError> {
        let entries = self.lock();
        Ok(keys
            .iter()
            .filter_map(|key| entries.get(*key).map(|v| ((*key).to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, entries: StoredMap) -> Result<(), StoreError> {
        self.lock().extend(entries);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.lock().clear();
        Ok(())
    }
}
