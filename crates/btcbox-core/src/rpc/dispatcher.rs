use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tracing::{debug, error, trace};

use crate::config::CHUNK_SIZE;
use crate::error::{CoreError, RpcError};

use super::request::{RpcBatch, RpcRequest};
use super::types::ResponseEnvelope;
use super::RpcTransport;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Executes single and batched calls against an [`RpcTransport`].
///
/// Batches are split into chunks of at most `chunk_size` requests which are
/// sent one after another, never concurrently.
pub struct BatchDispatcher {
    transport: Arc<dyn RpcTransport>,
    chunk_size: usize,
    limiter: Option<DirectRateLimiter>,
}

impl BatchDispatcher {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            transport,
            chunk_size: CHUNK_SIZE,
            limiter: None,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Result<Self, CoreError> {
        if chunk_size == 0 {
            return Err(CoreError::Config(
                "rpc batch chunk size must be at least 1".to_owned(),
            ));
        }
        self.chunk_size = chunk_size;
        Ok(self)
    }

    /// Limit outbound HTTP requests. Each chunk counts as one request.
    pub fn with_rate_limit(mut self, requests_per_second: u32) -> Result<Self, CoreError> {
        let limit = NonZeroU32::new(requests_per_second).ok_or_else(|| {
            CoreError::Config("requests_per_second must be at least 1".to_owned())
        })?;
        self.limiter = Some(RateLimiter::direct(Quota::per_second(limit)));
        Ok(self)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn transport(&self) -> &Arc<dyn RpcTransport> {
        &self.transport
    }

    async fn wait_for_rate_limit(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// Execute one call without chunking.
    pub async fn execute_single(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<ResponseEnvelope, RpcError> {
        self.wait_for_rate_limit().await;
        let request = RpcRequest::new(method, params);
        debug!(
            rpc.id = request.id(),
            rpc.method = method,
            rpc.params = request.params().len(),
            "rpc call"
        );

        let envelope = match self
            .transport
            .send(request.to_json())
            .await
            .and_then(decode_envelope)
        {
            Ok(envelope) => envelope,
            Err(err) => {
                error!(
                    endpoint = self.transport.endpoint(),
                    rpc.id = request.id(),
                    rpc.method = method,
                    error = %err,
                    "rpc call failed"
                );
                return Err(err);
            }
        };
        match envelope.error() {
            Some(err) => debug!(rpc.id = request.id(), rpc.method = method, error = %err, "rpc call returned error"),
            None => trace!(rpc.id = request.id(), rpc.method = method, "rpc call succeeded"),
        }
        Ok(envelope)
    }

    /// Execute many calls, returning one envelope per call in input order.
    ///
    /// A failure of any chunk fails the whole batch; partial results are
    /// never returned.
    pub async fn execute_batch(
        &self,
        calls: &[(String, Vec<serde_json::Value>)],
    ) -> Result<Vec<ResponseEnvelope>, RpcError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let chunk_count = calls.len().div_ceil(self.chunk_size);
        debug!(
            rpc.batch_size = calls.len(),
            rpc.chunks = chunk_count,
            rpc.chunk_size = self.chunk_size,
            "rpc batch call"
        );

        let mut responses = Vec::with_capacity(calls.len());
        for (index, chunk) in calls.chunks(self.chunk_size).enumerate() {
            let batch = RpcBatch::from_calls(chunk);
            match self.execute_chunk(&batch).await {
                Ok(chunk_responses) => responses.extend(chunk_responses),
                Err(err) => {
                    error!(
                        endpoint = self.transport.endpoint(),
                        chunk = index,
                        chunks = chunk_count,
                        chunk_offset = index * self.chunk_size,
                        chunk_len = batch.len(),
                        methods = ?batch.methods(),
                        error = %err,
                        "rpc batch chunk failed; abandoning batch"
                    );
                    return Err(err);
                }
            }
        }

        debug!(rpc.batch_size = calls.len(), "rpc batch completed");
        Ok(responses)
    }

    async fn execute_chunk(&self, batch: &RpcBatch) -> Result<Vec<ResponseEnvelope>, RpcError> {
        self.wait_for_rate_limit().await;
        let first_id = batch.requests().first().map(RpcRequest::id);
        trace!(
            rpc.batch_first_id = ?first_id,
            rpc.batch_len = batch.len(),
            "rpc batch chunk"
        );

        let raw = self.transport.send(batch.to_json()).await?;
        let items = match raw {
            serde_json::Value::Array(items) => items,
            other => {
                return Err(RpcError::InvalidResponse(format!(
                    "expected JSON array for batch response, got: {other}"
                )));
            }
        };
        if items.len() != batch.len() {
            return Err(RpcError::BatchLength {
                expected: batch.len(),
                actual: items.len(),
            });
        }

        items.into_iter().map(decode_envelope).collect()
    }
}

/// Decode one response object. Arrays and scalars are invalid responses.
fn decode_envelope(raw: serde_json::Value) -> Result<ResponseEnvelope, RpcError> {
    match raw {
        serde_json::Value::Object(_) => serde_json::from_value(raw)
            .map_err(|e| RpcError::InvalidResponse(format!("decode JSON-RPC response: {e}"))),
        other => Err(RpcError::InvalidResponse(format!(
            "expected JSON object for response, got: {other}"
        ))),
    }
}
