//! In-memory queue of downloads between interception and a terminal outcome.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// A download that passed filtering and awaits hand-off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingDownload {
    pub url: String,
    pub filename: String,
    pub timestamp: u64,
    /// Retries allowed after the first attempt.
    pub retry_count: u32,
}

/// Pending downloads keyed by URL. Never persisted.
#[derive(Debug, Default)]
pub struct PendingQueue {
    entries: DashMap<String, PendingDownload>,
}

impl PendingQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the entry for `download.url`.
    pub fn insert(&self, download: PendingDownload) {
        self.entries.insert(download.url.clone(), download);
    }

    pub fn remove(&self, url: &str) -> Option<PendingDownload> {
        self.entries.remove(url).map(|(_, download)| download)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(url, download)` pairs ordered by queue time.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, PendingDownload)> {
        let mut pairs: Vec<(String, PendingDownload)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        pairs.sort_by(|a, b| a.1.timestamp.cmp(&b.1.timestamp).then_with(|| a.0.cmp(&b.0)));
        pairs
    }
}
