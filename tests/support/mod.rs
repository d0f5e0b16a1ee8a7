//! Shared test doubles and helpers for integration tests.
//!
//! - [`ScriptedDaemon`] - `Daemon` returning queued results, recording calls
//! - [`RecordingHost`] - `BrowserHost` capturing commands and notifications
//! - [`FailingStore`] - `KeyValueStore` that always errors
//! - [`start_mock_server_or_skip`] - wiremock server, or `None` without sockets

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use relay_core::dispatch::{BrowserHost, HostError, HostEvent, Notification};
use relay_core::rpc::{Daemon, RpcError, VersionInfo};
use relay_core::store::{KeyValueStore, MemoryStore, SettingsStore, StoreError, StoredMap};
use relay_core::DownloadId;
use serde_json::Value;
use wiremock::MockServer;

pub const MB: u64 = 1024 * 1024;

/// Starts a wiremock server, or returns `None` when the sandbox forbids
/// binding a local socket.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if let Err(e) = std::net::TcpListener::bind("127.0.0.1:0") {
        eprintln!("skipping: cannot bind local socket: {e}");
        return None;
    }
    Some(MockServer::start().await)
}

/// One recorded `addUri` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddUriCall {
    pub endpoint: String,
    pub url: String,
    pub filename: Option<String>,
}

/// Daemon double. Each call pops the next scripted outcome; once the script
/// is exhausted the fallback applies.
#[derive(Default)]
pub struct ScriptedDaemon {
    script: Mutex<VecDeque<bool>>,
    fallback_ok: bool,
    calls: Mutex<Vec<AddUriCall>>,
}

impl ScriptedDaemon {
    /// Accepts every call.
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self {
            fallback_ok: true,
            ..Self::default()
        })
    }

    /// Rejects every call with a transport error.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Plays `outcomes` in order, then accepts.
    pub fn scripted(outcomes: &[bool]) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(outcomes.iter().copied().collect()),
            fallback_ok: true,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<AddUriCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Daemon for ScriptedDaemon {
    async fn send_add_uri(
        &self,
        endpoint: &str,
        url: &str,
        filename: Option<&str>,
    ) -> Result<String, RpcError> {
        self.calls.lock().unwrap().push(AddUriCall {
            endpoint: endpoint.to_string(),
            url: url.to_string(),
            filename: filename.map(str::to_string),
        });
        let ok = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback_ok);
        if ok {
            Ok(format!("gid-{}", self.call_count()))
        } else {
            Err(RpcError::timeout(endpoint, std::time::Duration::from_secs(10)))
        }
    }

    async fn send_get_version(&self, endpoint: &str) -> Result<VersionInfo, RpcError> {
        if self.fallback_ok {
            Ok(VersionInfo {
                version: Some("1.37.0".to_string()),
                enabled_features: Vec::new(),
            })
        } else {
            Err(RpcError::http_status(endpoint, 503))
        }
    }
}

/// Everything a [`RecordingHost`] was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Cancel(DownloadId),
    Erase(DownloadId),
    Notify(Notification),
    HistoryUpdated,
}

/// Host double. Cancel can be made to fail to simulate finished downloads.
#[derive(Default)]
pub struct RecordingHost {
    calls: Mutex<Vec<HostCall>>,
    pub reject_cancel: bool,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rejecting_cancel() -> Arc<Self> {
        Arc::new(Self {
            reject_cancel: true,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                HostCall::Notify(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    pub fn history_updates(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, HostCall::HistoryUpdated))
            .count()
    }

    fn push(&self, call: HostCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl BrowserHost for RecordingHost {
    async fn cancel_download(&self, id: DownloadId) -> Result<(), HostError> {
        if self.reject_cancel {
            return Err(HostError::rejected("cancel", "download already complete"));
        }
        self.push(HostCall::Cancel(id));
        Ok(())
    }

    async fn erase_download(&self, id: DownloadId) -> Result<(), HostError> {
        self.push(HostCall::Erase(id));
        Ok(())
    }

    fn show_notification(&self, notification: Notification) -> Result<(), HostError> {
        self.push(HostCall::Notify(notification));
        Ok(())
    }

    fn emit(&self, event: HostEvent) -> Result<(), HostError> {
        match event {
            HostEvent::HistoryUpdated => self.push(HostCall::HistoryUpdated),
        }
        Ok(())
    }
}

/// Backend whose every operation fails.
#[derive(Debug, Default)]
pub struct FailingStore;

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _keys: &[&str]) -> Result<StoredMap, StoreError> {
        Err(StoreError::Unavailable("disk on fire".to_string()))
    }

    async fn set(&self, _entries: StoredMap) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk on fire".to_string()))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk on fire".to_string()))
    }
}

/// Settings store over a memory backend seeded with `initial`, already loaded.
pub async fn loaded_store(initial: Value) -> (Arc<MemoryStore>, Arc<SettingsStore>) {
    let backend = Arc::new(MemoryStore::with_entries(
        initial.as_object().cloned().unwrap_or_default(),
    ));
    let store = Arc::new(SettingsStore::new(backend.clone()));
    store.load().await.unwrap();
    (backend, store)
}
