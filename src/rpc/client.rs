//! HTTP JSON-RPC client for the download daemon.
//!
//! [`RpcClient`] is stateless apart from its connection pool and request id
//! counter: the endpoint is passed on every call so a settings change takes
//! effect on the next request. The [`Daemon`] trait is the seam the dispatch
//! engine depends on; its provided methods implement the boolean/status
//! boundary on top of the fallible calls.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use super::envelope::{
    AddUriOptions, HealthStatus, METHOD_ADD_URI, METHOD_GET_VERSION, RpcRequest, RpcResponse,
    UNKNOWN_VERSION, VersionInfo, add_uri_params,
};
use super::error::RpcError;
use crate::clock::now_millis;
use crate::filename::sanitize_filename;
use crate::user_agent::relay_user_agent;

/// Default per-request timeout.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// Operations the relay needs from the daemon.
#[async_trait]
pub trait Daemon: Send + Sync {
    /// Queues `url`, returning the daemon's transfer id (gid).
    async fn send_add_uri(
        &self,
        endpoint: &str,
        url: &str,
        filename: Option<&str>,
    ) -> Result<String, RpcError>;

    /// Fetches the daemon version.
    async fn send_get_version(&self, endpoint: &str) -> Result<VersionInfo, RpcError>;

    /// Queues `url`; any failure becomes `false` with the cause logged.
    async fn add_uri(&self, endpoint: &str, url: &str, filename: Option<&str>) -> bool {
        match self.send_add_uri(endpoint, url, filename).await {
            Ok(gid) => {
                debug!(url, gid = %gid, "daemon accepted uri");
                true
            }
            Err(error) => {
                warn!(url, endpoint, error = %error, "addUri failed");
                false
            }
        }
    }

    /// Probes the daemon; failures are reported as offline.
    async fn check_health(&self, endpoint: &str) -> HealthStatus {
        match self.send_get_version(endpoint).await {
            Ok(info) => HealthStatus::online(
                info.version.unwrap_or_else(|| UNKNOWN_VERSION.to_string()),
            ),
            Err(error) => {
                debug!(endpoint, error = %error, "health check failed");
                HealthStatus::offline(error.to_string())
            }
        }
    }
}

/// reqwest-backed [`Daemon`] implementation.
#[derive(Debug, Clone)]
pub struct RpcClient {
    client: Client,
    timeout: Duration,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    /// Creates a client whose requests time out after `timeout`.
    ///
    /// # Arguments
    ///
    /// * `timeout` - Applied to each request as a whole, connect included
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ClientBuild`] if the TLS backend cannot initialise.
    pub fn new(timeout: Duration) -> Result<Self, RpcError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .user_agent(relay_user_agent())
            .build()
            .map_err(RpcError::ClientBuild)?;
        Ok(Self {
            client,
            timeout,
            next_id: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Configured request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn request_id(&self) -> String {
        let seq = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("{}-{seq}", now_millis())
    }

    /// Sends one request and returns its non-empty `result`.
    #[instrument(skip(self, params), fields(endpoint = %endpoint))]
    async fn call(
        &self,
        endpoint: &str,
        method: &'static str,
        params: Value,
    ) -> Result<Value, RpcError> {
        let url = validate_endpoint(endpoint)?;
        let request = RpcRequest::new(self.request_id(), method, params);
        debug!(id = %request.id, "sending rpc request");

        let response = self
            .client
            .post(url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError::transport(endpoint, e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::http_status(endpoint, status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RpcError::transport(endpoint, e, self.timeout))?;
        let parsed: RpcResponse =
            serde_json::from_str(&body).map_err(|e| RpcError::malformed(endpoint, e))?;

        if let Some(error) = parsed.error {
            return Err(RpcError::rpc(error.code, error.message));
        }

        match parsed.result {
            None | Some(Value::Null | Value::Bool(false)) => Err(RpcError::EmptyResult { method }),
            Some(Value::String(s)) if s.is_empty() => Err(RpcError::EmptyResult { method }),
            Some(result) => Ok(result),
        }
    }
}

#[async_trait]
impl Daemon for RpcClient {
    #[instrument(skip(self), fields(endpoint = %endpoint))]
    async fn send_add_uri(
        &self,
        endpoint: &str,
        url: &str,
        filename: Option<&str>,
    ) -> Result<String, RpcError> {
        let out = filename.and_then(sanitize_filename);
        let options = AddUriOptions::new(out);
        let result = self
            .call(endpoint, METHOD_ADD_URI, add_uri_params(url, &options))
            .await?;
        Ok(match result {
            Value::String(gid) => gid,
            other => other.to_string(),
        })
    }

    #[instrument(skip(self), fields(endpoint = %endpoint))]
    async fn send_get_version(&self, endpoint: &str) -> Result<VersionInfo, RpcError> {
        let result = self
            .call(endpoint, METHOD_GET_VERSION, Value::Array(Vec::new()))
            .await?;
        serde_json::from_value(result).map_err(|e| RpcError::malformed(endpoint, e))
    }
}

/// Accepts only absolute `http`/`https` endpoints.
///
/// # Errors
///
/// Returns [`RpcError::InvalidEndpoint`] for anything else.
pub fn validate_endpoint(endpoint: &str) -> Result<Url, RpcError> {
    let url = Url::parse(endpoint.trim()).map_err(|_| RpcError::invalid_endpoint(endpoint))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(RpcError::invalid_endpoint(endpoint)),
    }
}
