//! JSON-RPC 2.0 wire types for the daemon's aria2-style surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::user_agent::FORWARDED_USER_AGENT;

/// Method that queues a URI on the daemon.
pub const METHOD_ADD_URI: &str = "aria2.addUri";

/// Method used as a health probe.
pub const METHOD_GET_VERSION: &str = "aria2.getVersion";

/// Parallel connections per server requested for every transfer.
pub const CONNECTIONS_PER_SERVER: u32 = 16;

/// Number of pieces a transfer is split into.
pub const SPLIT_COUNT: u32 = 16;

/// Outgoing JSON-RPC request envelope.
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub id: String,
    pub method: &'static str,
    pub params: Value,
}

impl RpcRequest {
    #[must_use]
    pub fn new(id: String, method: &'static str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RpcErrorObject {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// Incoming JSON-RPC response envelope.
///
/// Only the fields the relay inspects are modelled; `jsonrpc` and `id` are
/// ignored because each request waits on its own HTTP response.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

/// Options object sent as the second `addUri` parameter.
///
/// aria2 expects every option value as a string.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AddUriOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out: Option<String>,
    #[serde(rename = "max-connection-per-server")]
    pub max_connection_per_server: String,
    pub split: String,
    #[serde(rename = "continue")]
    pub continue_partial: String,
    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl AddUriOptions {
    /// Standard options with an optional, already sanitized output name.
    #[must_use]
    pub fn new(out: Option<String>) -> Self {
        Self {
            out,
            max_connection_per_server: CONNECTIONS_PER_SERVER.to_string(),
            split: SPLIT_COUNT.to_string(),
            continue_partial: "true".to_string(),
            user_agent: FORWARDED_USER_AGENT.to_string(),
        }
    }
}

/// Builds `[[url], options]`.
#[must_use]
pub fn add_uri_params(url: &str, options: &AddUriOptions) -> Value {
    serde_json::json!([[url], options])
}

/// Reported when the daemon answers `aria2.getVersion` without a version.
pub const UNKNOWN_VERSION: &str = "unknown";

/// Result of `aria2.getVersion`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub enabled_features: Vec<String>,
}

/// Daemon reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Online,
    Offline,
}

/// Outcome of a health check. Never an error: offline carries the cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: ConnectionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    #[must_use]
    pub fn online(version: impl Into<String>) -> Self {
        Self {
            status: ConnectionStatus::Online,
            version: Some(version.into()),
            error: None,
        }
    }

    #[must_use]
    pub fn offline(error: impl Into<String>) -> Self {
        Self {
            status: ConnectionStatus::Offline,
            version: None,
            error: Some(error.into()),
        }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.status == ConnectionStatus::Online
    }
}
