//! JSON-RPC layer for Bitcoin-like nodes.
//!
//! Defines the [`RpcTransport`] trait, an HTTP implementation
//! ([`HttpTransport`]), the chunking [`BatchDispatcher`], and a test mock
//! (`mock::MockTransport`).

mod dispatcher;
mod http_adapter;
#[cfg(test)]
pub mod mock;
pub mod request;
pub mod types;

pub use dispatcher::BatchDispatcher;
pub use http_adapter::{make_url, HttpTransport};
pub use request::{RpcBatch, RpcRequest};
pub use types::{normalize_batch, normalize_single, Reply, ReplyMode, ResponseEnvelope};

use async_trait::async_trait;

use crate::error::RpcError;

/// One request/response exchange with the node.
///
/// The payload is either a single request envelope or an array of them; the
/// returned value is the decoded response body. Implementations must be
/// safe to share between concurrently suspended callers.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn send(&self, payload: serde_json::Value) -> Result<serde_json::Value, RpcError>;

    /// Release the underlying connection. Safe to call before first use and
    /// more than once.
    async fn close(&self) {}

    /// Endpoint description for logs. Must not contain credentials.
    fn endpoint(&self) -> &str;
}
