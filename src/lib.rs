//! Download Relay Core Library
//!
//! Intercepts browser-initiated downloads and hands them to an external
//! download manager speaking an aria2-style JSON-RPC dialect.
//!
//! # Architecture
//!
//! - [`intercept`] - download event payloads and the intercept-or-ignore policy
//! - [`dedup`] - bounded, time-windowed duplicate suppression
//! - [`rpc`] - JSON-RPC client for the daemon
//! - [`dispatch`] - engine tying classification, dedup, cancel and hand-off together
//! - [`store`] - cached settings and history over a key-value backend
//! - [`messages`] - control protocol for the settings UI
//! - [`bridge`] - framed stdio adapter to the browser shim

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bridge;
pub mod clock;
pub mod dedup;
pub mod dispatch;
pub mod filename;
pub mod intercept;
pub mod messages;
pub mod rpc;
pub mod store;
pub mod user_agent;

// Re-export commonly used types
pub use bridge::Bridge;
pub use dedup::{DedupGuard, DedupVerdict};
pub use dispatch::{
    BrowserHost, DispatchEngine, DispatchOutcome, EngineConfig, FailureType, RetryDecision,
    RetryPolicy, classify_error,
};
pub use intercept::{DownloadDelta, DownloadDescriptor, DownloadId, classify, should_intercept};
pub use messages::{ControlRequest, ControlResponse, handle_message};
pub use rpc::{Daemon, HealthStatus, RpcClient, RpcError};
pub use store::{
    HistoryItem, HistoryStatus, KeyValueStore, MemoryStore, Settings, SettingsStore, SqliteStore,
    StoreError,
};
