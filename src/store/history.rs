//! Dispatch outcome history, newest first.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// Terminal outcome of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Success,
    Error,
}

impl HistoryStatus {
    #[must_use]
    pub fn from_success(success: bool) -> Self {
        if success { Self::Success } else { Self::Error }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for HistoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded outcome. Ids are millisecond timestamps stored as strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub url: String,
    pub filename: String,
    pub status: HistoryStatus,
    pub timestamp: u64,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

/// Bounded history list with a unique id generator.
#[derive(Debug, Default, Clone)]
pub struct History {
    items: Vec<HistoryItem>,
    last_id: u64,
}

impl History {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes the persisted `downloadHistory` value, skipping malformed
    /// entries, and truncates to `limit`.
    #[must_use]
    pub fn from_stored(value: Option<&Value>, limit: usize) -> Self {
        let items: Vec<HistoryItem> = match value {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(|entry| match HistoryItem::deserialize(entry) {
                    Ok(item) => Some(item),
                    Err(error) => {
                        warn!(error = %error, "skipping malformed history entry");
                        None
                    }
                })
                .collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(_) => {
                warn!("stored history is not an array, starting empty");
                Vec::new()
            }
        };
        let last_id = items
            .iter()
            .filter_map(|item| item.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        let mut history = Self { items, last_id };
        history.truncate(limit);
        history
    }

    /// Persistable form.
    #[must_use]
    pub fn to_stored(&self) -> Value {
        Value::Array(
            self.items
                .iter()
                .filter_map(|item| serde_json::to_value(item).ok())
                .collect(),
        )
    }

    /// Prepends a new item created at `now` and truncates to `limit`.
    pub fn record(
        &mut self,
        url: &str,
        filename: &str,
        status: HistoryStatus,
        now: u64,
        limit: usize,
    ) -> HistoryItem {
        let id = self.next_id(now);
        let item = HistoryItem {
            id: id.to_string(),
            url: url.to_string(),
            filename: filename.to_string(),
            status,
            timestamp: now,
        };
        self.items.insert(0, item.clone());
        self.truncate(limit);
        item
    }

    /// Keeps only the newest `limit` items.
    pub fn truncate(&mut self, limit: usize) {
        self.items.truncate(limit);
    }

    #[must_use]
    pub fn items(&self) -> &[HistoryItem] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Removes all items. Ids keep increasing.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    fn next_id(&mut self, now: u64) -> u64 {
        let id = now.max(self.last_id.saturating_add(1));
        self.last_id = id;
        id
    }
}
