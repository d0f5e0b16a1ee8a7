//! Error types for daemon JSON-RPC calls.
//!
//! These never cross the public boolean/status boundary of the client; they
//! exist so the dispatch engine can log the precise cause and decide whether
//! another attempt makes sense.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while calling the daemon.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The configured endpoint is not an `http(s)` URL.
    #[error("invalid endpoint URL: {endpoint}")]
    InvalidEndpoint {
        /// The rejected endpoint string.
        endpoint: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// Network-level error (connection refused, DNS, reset).
    #[error("network error calling {endpoint}: {source}")]
    Network {
        /// Endpoint that was called.
        endpoint: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// No complete response within the configured timeout.
    #[error("timeout after {}s calling {endpoint}", timeout.as_secs())]
    Timeout {
        /// Endpoint that was called.
        endpoint: String,
        /// Configured request timeout.
        timeout: Duration,
    },

    /// Non-2xx HTTP response.
    #[error("HTTP {status} from {endpoint}")]
    HttpStatus {
        /// Endpoint that was called.
        endpoint: String,
        /// HTTP status code.
        status: u16,
    },

    /// The daemon answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },

    /// The body was not a JSON-RPC response.
    #[error("malformed response from {endpoint}: {reason}")]
    MalformedResponse {
        /// Endpoint that was called.
        endpoint: String,
        /// Decoder message.
        reason: String,
    },

    /// The daemon accepted the call but returned no usable result.
    #[error("{method} returned an empty result")]
    EmptyResult {
        /// JSON-RPC method name.
        method: &'static str,
    },
}

impl RpcError {
    /// Creates an invalid endpoint error.
    pub fn invalid_endpoint(endpoint: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.into(),
        }
    }

    /// Creates a transport error, mapping reqwest timeouts to [`RpcError::Timeout`].
    pub fn transport(endpoint: impl Into<String>, source: reqwest::Error, timeout: Duration) -> Self {
        let endpoint = endpoint.into();
        if source.is_timeout() {
            Self::Timeout { endpoint, timeout }
        } else {
            Self::Network { endpoint, source }
        }
    }

    /// Creates a timeout error.
    pub fn timeout(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            endpoint: endpoint.into(),
            timeout,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(endpoint: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            endpoint: endpoint.into(),
            status,
        }
    }

    /// Creates an error from a JSON-RPC error object.
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
        }
    }

    /// Creates a malformed-response error.
    pub fn malformed(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedResponse {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }
}
