//! Settings and history persistence.
//!
//! [`SettingsStore`] is the in-memory cache the rest of the relay reads from.
//! It is overlaid with persisted values on [`SettingsStore::load`] and written
//! back through a [`KeyValueStore`] after each mutation. When the backend
//! fails, the cache stays authoritative for the rest of the process.
//!
//! The pending download queue is never persisted.

mod error;
mod history;
mod kv;
mod settings;
mod sqlite;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, instrument, warn};

pub use error::StoreError;
pub use history::{History, HistoryItem, HistoryStatus};
pub use kv::{KeyValueStore, MemoryStore, StoredMap};
pub use settings::{
    DEFAULT_AUTO_RETRY, DEFAULT_ENDPOINT_URL, DEFAULT_MAX_HISTORY_ITEMS, DEFAULT_MAX_RETRIES,
    DEFAULT_MIN_SIZE_MB, SETTINGS_KEYS, Settings, SettingsPatch, keys,
};
pub use sqlite::SqliteStore;

use crate::clock::now_millis;

/// Cached settings and history backed by a key-value store.
pub struct SettingsStore {
    backend: Arc<dyn KeyValueStore>,
    settings: RwLock<Settings>,
    history: Mutex<History>,
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("settings", &*self.read_settings())
            .field("history_len", &self.lock_history().len())
            .finish_non_exhaustive()
    }
}

impl SettingsStore {
    /// Creates a store holding defaults. Call [`SettingsStore::load`] to
    /// overlay persisted values.
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            settings: RwLock::new(Settings::default()),
            history: Mutex::new(History::new()),
        }
    }

    /// Replaces the cache with persisted values, defaulting missing keys.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the cache is left untouched in that case.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<(), StoreError> {
        let mut wanted: Vec<&str> = SETTINGS_KEYS.to_vec();
        wanted.push(keys::DOWNLOAD_HISTORY);
        let stored = self.backend.get(&wanted).await?;

        let settings = Settings::from_stored(&stored);
        let history = History::from_stored(
            stored.get(keys::DOWNLOAD_HISTORY),
            settings.history_limit(),
        );
        info!(
            min_size_mb = settings.min_size_mb,
            endpoint = %settings.endpoint_url,
            history = history.len(),
            "settings loaded"
        );

        *self.write_settings() = settings;
        *self.lock_history() = history;
        Ok(())
    }

    /// Writes settings and the capped history.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    #[instrument(skip(self))]
    pub async fn save(&self) -> Result<(), StoreError> {
        let entries = self.snapshot_entries();
        self.backend.set(entries).await?;
        debug!("settings saved");
        Ok(())
    }

    /// Saves, logging instead of returning a failure.
    pub async fn save_or_warn(&self) {
        if let Err(error) = self.save().await {
            warn!(error = %error, "failed to persist settings");
        }
    }

    /// Current settings.
    #[must_use]
    pub fn settings(&self) -> Settings {
        self.read_settings().clone()
    }

    /// Applies a user update and persists it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidSetting`] if the patch is rejected.
    /// Persistence failures are logged only.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, patch: SettingsPatch) -> Result<Settings, StoreError> {
        let updated = {
            let mut settings = self.write_settings();
            settings.apply_patch(patch)?;
            settings.clone()
        };
        self.lock_history().truncate(updated.history_limit());
        self.save_or_warn().await;
        Ok(updated)
    }

    /// Applies a storage change notification to the cache. Nothing is written
    /// back since the change came from the backend.
    pub fn apply_storage_changes(&self, changes: &StoredMap) -> bool {
        let changed = self.write_settings().apply_changes(changes);
        if changed {
            debug!("settings updated from storage change");
        }
        changed
    }

    /// Consumes the one-shot skip flag. Returns true if it was set, in which
    /// case the cleared flag is persisted.
    pub async fn take_skip_next(&self) -> bool {
        let was_set = {
            let mut settings = self.write_settings();
            std::mem::replace(&mut settings.skip_next, false)
        };
        if was_set {
            self.save_or_warn().await;
        }
        was_set
    }

    /// Prepends a history item in memory. Callers persist with
    /// [`SettingsStore::save`].
    pub fn record(&self, url: &str, filename: &str, status: HistoryStatus) -> HistoryItem {
        let limit = self.read_settings().history_limit();
        self.lock_history()
            .record(url, filename, status, now_millis(), limit)
    }

    /// History, newest first.
    #[must_use]
    pub fn history(&self) -> Vec<HistoryItem> {
        self.lock_history().items().to_vec()
    }

    /// Empties the history and persists.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the in-memory history is cleared regardless.
    pub async fn clear_history(&self) -> Result<(), StoreError> {
        self.lock_history().clear();
        self.save().await
    }

    /// Clears the backend and writes defaults back.
    ///
    /// # Errors
    ///
    /// Returns the backend error. The cache is reset to defaults regardless.
    #[instrument(skip(self))]
    pub async fn reset(&self) -> Result<(), StoreError> {
        *self.write_settings() = Settings::default();
        self.lock_history().clear();
        self.backend.clear().await?;
        self.save().await?;
        info!("store reset to defaults");
        Ok(())
    }

    fn snapshot_entries(&self) -> StoredMap {
        let settings = self.read_settings();
        let mut history = self.lock_history();
        history.truncate(settings.history_limit());
        let mut entries = settings.to_stored();
        entries.insert(keys::DOWNLOAD_HISTORY.to_string(), history.to_stored());
        entries
    }

    fn read_settings(&self) -> RwLockReadGuard<'_, Settings> {
        self.settings.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_settings(&self) -> RwLockWriteGuard<'_, Settings> {
        self.settings.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_history(&self) -> MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
