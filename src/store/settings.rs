//! Runtime settings and their persisted key layout.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::StoreError;
use super::kv::StoredMap;

/// Default daemon endpoint.
pub const DEFAULT_ENDPOINT_URL: &str = "http://localhost:16800/jsonrpc";

/// Default size floor in megabytes.
pub const DEFAULT_MIN_SIZE_MB: f64 = 5.0;

/// Default number of history items kept.
pub const DEFAULT_MAX_HISTORY_ITEMS: u32 = 100;

/// Default for automatic retries.
pub const DEFAULT_AUTO_RETRY: bool = true;

/// Default number of extra attempts per dispatch.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Persisted key names.
pub mod keys {
    pub const MIN_SIZE_MB: &str = "minSizeMB";
    pub const SKIP_NEXT: &str = "skipNext";
    /// Written on save.
    pub const MOTRIX_URL: &str = "motrixUrl";
    /// Accepted on read.
    pub const ENDPOINT_URL: &str = "endpointUrl";
    pub const MAX_HISTORY_ITEMS: &str = "maxHistoryItems";
    pub const AUTO_RETRY: &str = "autoRetry";
    pub const MAX_RETRIES: &str = "maxRetries";
    pub const EXCLUDED_EXT: &str = "excludedExt";
    pub const DOWNLOAD_HISTORY: &str = "downloadHistory";
}

/// Every settings key read on load. `endpointUrl` precedes `motrixUrl` so the
/// latter wins when both are stored.
pub const SETTINGS_KEYS: &[&str] = &[
    keys::MIN_SIZE_MB,
    keys::SKIP_NEXT,
    keys::ENDPOINT_URL,
    keys::MOTRIX_URL,
    keys::MAX_HISTORY_ITEMS,
    keys::AUTO_RETRY,
    keys::MAX_RETRIES,
    keys::EXCLUDED_EXT,
];

/// Process-wide interception and dispatch settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Size floor in MB; 0 disables the size check.
    #[serde(rename = "minSizeMB")]
    pub min_size_mb: f64,
    /// One-shot flag: ignore the next download event.
    pub skip_next: bool,
    /// Serialized under the persisted key so control clients see one name.
    #[serde(rename = "motrixUrl")]
    pub endpoint_url: String,
    pub max_history_items: u32,
    pub auto_retry: bool,
    pub max_retries: u32,
    /// Suffixes removed from the stock allow-list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_ext: Option<Vec<String>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_size_mb: DEFAULT_MIN_SIZE_MB,
            skip_next: false,
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            max_history_items: DEFAULT_MAX_HISTORY_ITEMS,
            auto_retry: DEFAULT_AUTO_RETRY,
            max_retries: DEFAULT_MAX_RETRIES,
            excluded_ext: None,
        }
    }
}

impl Settings {
    /// Builds settings from stored entries. Missing or ill-typed keys keep
    /// their defaults.
    #[must_use]
    pub fn from_stored(stored: &StoredMap) -> Self {
        let mut settings = Self::default();
        for key in SETTINGS_KEYS {
            if let Some(value) = stored.get(*key) {
                settings.apply_value(key, value);
            }
        }
        settings
    }

    /// Entries written on save.
    #[must_use]
    pub fn to_stored(&self) -> StoredMap {
        let mut map = StoredMap::new();
        map.insert(keys::MIN_SIZE_MB.to_string(), Value::from(self.min_size_mb));
        map.insert(keys::SKIP_NEXT.to_string(), Value::from(self.skip_next));
        map.insert(
            keys::MOTRIX_URL.to_string(),
            Value::from(self.endpoint_url.clone()),
        );
        map.insert(
            keys::MAX_HISTORY_ITEMS.to_string(),
            Value::from(self.max_history_items),
        );
        map.insert(keys::AUTO_RETRY.to_string(), Value::from(self.auto_retry));
        map.insert(keys::MAX_RETRIES.to_string(), Value::from(self.max_retries));
        map.insert(
            keys::EXCLUDED_EXT.to_string(),
            self.excluded_ext.clone().map_or(Value::Null, Value::from),
        );
        map
    }

    /// Applies a storage change notification of the shape
    /// `{key: {oldValue?, newValue?}}`. Returns true if any field changed.
    ///
    /// A key without `newValue` keeps the current value.
    pub fn apply_changes(&mut self, changes: &StoredMap) -> bool {
        let before = self.clone();
        for key in SETTINGS_KEYS {
            let new_value = changes
                .get(*key)
                .and_then(Value::as_object)
                .and_then(|change| change.get("newValue"));
            if let Some(value) = new_value {
                self.apply_value(key, value);
            }
        }
        *self != before
    }

    /// Applies an explicit update.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidSetting`] without modifying anything if a
    /// field is out of range.
    pub fn apply_patch(&mut self, patch: SettingsPatch) -> Result<(), StoreError> {
        patch.validate()?;
        if let Some(value) = patch.min_size_mb {
            self.min_size_mb = value;
        }
        if let Some(value) = patch.skip_next {
            self.skip_next = value;
        }
        if let Some(value) = patch.endpoint_url {
            self.endpoint_url = value.trim().to_string();
        }
        if let Some(value) = patch.max_history_items {
            self.max_history_items = value;
        }
        if let Some(value) = patch.auto_retry {
            self.auto_retry = value;
        }
        if let Some(value) = patch.max_retries {
            self.max_retries = value;
        }
        if let Some(list) = patch.excluded_ext {
            self.excluded_ext = normalize_excluded(list);
        }
        Ok(())
    }

    /// Extra attempts a new pending download gets.
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        if self.auto_retry { self.max_retries } else { 0 }
    }

    /// History cap as a length.
    #[must_use]
    pub fn history_limit(&self) -> usize {
        usize::try_from(self.max_history_items).unwrap_or(usize::MAX)
    }

    fn apply_value(&mut self, key: &str, value: &Value) {
        match key {
            keys::MIN_SIZE_MB => {
                if let Some(v) = value.as_f64().filter(|v| v.is_finite() && *v >= 0.0) {
                    self.min_size_mb = v;
                }
            }
            keys::SKIP_NEXT => {
                if let Some(v) = value.as_bool() {
                    self.skip_next = v;
                }
            }
            keys::MOTRIX_URL | keys::ENDPOINT_URL => {
                if let Some(v) = value.as_str().map(str::trim).filter(|v| !v.is_empty()) {
                    self.endpoint_url = v.to_string();
                }
            }
            keys::MAX_HISTORY_ITEMS => {
                if let Some(v) = as_u32(value).filter(|v| *v > 0) {
                    self.max_history_items = v;
                }
            }
            keys::AUTO_RETRY => {
                if let Some(v) = value.as_bool() {
                    self.auto_retry = v;
                }
            }
            keys::MAX_RETRIES => {
                if let Some(v) = as_u32(value) {
                    self.max_retries = v;
                }
            }
            keys::EXCLUDED_EXT => match value {
                Value::Null => self.excluded_ext = None,
                Value::Array(items) => {
                    let list: Option<Vec<String>> = items
                        .iter()
                        .map(|item| item.as_str().map(str::to_string))
                        .collect();
                    if let Some(list) = list {
                        self.excluded_ext = normalize_excluded(list);
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }
}

fn as_u32(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|v| u32::try_from(v).ok())
}

fn normalize_excluded(list: Vec<String>) -> Option<Vec<String>> {
    let list: Vec<String> = list
        .into_iter()
        .map(|ext| ext.trim().to_string())
        .filter(|ext| !ext.is_empty())
        .collect();
    if list.is_empty() { None } else { Some(list) }
}

/// Partial update received from the control channel.
///
/// Unknown fields are ignored. `motrixUrl` is accepted for the endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, rename = "minSizeMB")]
    pub min_size_mb: Option<f64>,
    #[serde(default)]
    pub skip_next: Option<bool>,
    #[serde(default, alias = "motrixUrl")]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub max_history_items: Option<u32>,
    #[serde(default)]
    pub auto_retry: Option<bool>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// An empty list clears the override.
    #[serde(default)]
    pub excluded_ext: Option<Vec<String>>,
}

impl SettingsPatch {
    fn validate(&self) -> Result<(), StoreError> {
        if let Some(v) = self.min_size_mb
            && !(v.is_finite() && v >= 0.0)
        {
            return Err(StoreError::invalid_setting(
                keys::MIN_SIZE_MB,
                format!("{v} is not a non-negative number"),
            ));
        }
        if let Some(url) = &self.endpoint_url
            && url.trim().is_empty()
        {
            return Err(StoreError::invalid_setting(keys::ENDPOINT_URL, "must not be empty"));
        }
        if self.max_history_items == Some(0) {
            return Err(StoreError::invalid_setting(
                keys::MAX_HISTORY_ITEMS,
                "must be at least 1",
            ));
        }
        Ok(())
    }
}
