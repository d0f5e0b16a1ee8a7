//! Client for the download daemon's JSON-RPC control plane.
//!
//! # Overview
//!
//! - [`RpcClient`] - reqwest-backed transport with a per-request timeout
//! - [`Daemon`] - async seam used by the dispatch engine (mockable in tests)
//! - [`RpcError`] - precise failure cause, logged but never surfaced to hosts
//!
//! Only two methods are used: `aria2.addUri` and `aria2.getVersion`.

mod client;
mod envelope;
mod error;

pub use client::{DEFAULT_RPC_TIMEOUT, Daemon, RpcClient, validate_endpoint};
pub use envelope::{
    AddUriOptions, CONNECTIONS_PER_SERVER, ConnectionStatus, HealthStatus, METHOD_ADD_URI,
    METHOD_GET_VERSION, RpcErrorObject, RpcRequest, RpcResponse, SPLIT_COUNT, UNKNOWN_VERSION,
    VersionInfo, add_uri_params,
};
pub use error::RpcError;
