//! Transports for JSON-RPC requests to a Solana node.

use std::{future::Future, time::Duration};

use solana_rpc_client_api::request::RpcRequest;

#[cfg(http_rpc_sender)]
mod http_rpc_sender;

#[cfg(http_rpc_sender)]
pub use http_rpc_sender::HttpRpcSender;

/// Counters of a transport.
#[derive(Debug, Default, Clone)]
pub struct RpcTransportStats {
    /// Requests issued.
    pub request_count: usize,
    /// Time spent waiting for responses.
    pub elapsed_time: Duration,
    /// Part of `elapsed_time` spent backing off after `429` responses.
    pub rate_limited_time: Duration,
}

/// Sends a request to a node and returns the `result` member of the response.
///
/// A JSON-RPC error object is returned as [`Error::RpcResponse`](crate::Error::RpcResponse).
pub trait RpcSender {
    /// Send an [`RpcRequest`] with JSON parameters.
    fn send(
        &self,
        request: RpcRequest,
        params: serde_json::Value,
    ) -> impl Future<Output = crate::Result<serde_json::Value>> + Send;

    /// Get the transport counters.
    fn get_transport_stats(&self) -> RpcTransportStats;

    /// Get the endpoint URL.
    fn url(&self) -> String;
}
