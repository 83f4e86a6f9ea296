use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::error::RpcError;

use super::RpcTransport;

type Responder = Box<dyn Fn(&serde_json::Value) -> serde_json::Value + Send + Sync>;

/// A mock transport for testing. Answers payloads through a responder
/// closure and records every dispatch so tests can check chunk sizes and
/// that dispatches never overlap.
pub struct MockTransport {
    responder: Responder,
    fail_on_dispatch: Option<usize>,
    delay: Duration,
    dispatched: Mutex<Vec<usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    closed: AtomicBool,
}

impl MockTransport {
    pub fn builder() -> MockTransportBuilder {
        MockTransportBuilder {
            responder: Box::new(echo_first_param),
            fail_on_dispatch: None,
            delay: Duration::from_millis(1),
        }
    }

    /// Sizes of every dispatched payload, in order. A single request counts
    /// as size 1.
    pub fn dispatch_sizes(&self) -> Vec<usize> {
        self.dispatched.lock().expect("mock lock poisoned").clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub struct MockTransportBuilder {
    responder: Responder,
    fail_on_dispatch: Option<usize>,
    delay: Duration,
}

impl MockTransportBuilder {
    /// Answer every payload with a fixed body.
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.responder = Box::new(move |_| body.clone());
        self
    }

    /// Answer each request with its own closure-computed envelope.
    pub fn with_responder(
        mut self,
        responder: impl Fn(&serde_json::Value) -> serde_json::Value + Send + Sync + 'static,
    ) -> Self {
        self.responder = Box::new(responder);
        self
    }

    /// Fail the dispatch with this zero-based index with a transport error.
    pub fn fail_on_dispatch(mut self, index: usize) -> Self {
        self.fail_on_dispatch = Some(index);
        self
    }

    pub fn build(self) -> MockTransport {
        MockTransport {
            responder: self.responder,
            fail_on_dispatch: self.fail_on_dispatch,
            delay: self.delay,
            dispatched: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }
}

/// Default responder: each request's result is its first param, so tests
/// can check that output order matches input order.
fn echo_first_param(payload: &serde_json::Value) -> serde_json::Value {
    let answer = |req: &serde_json::Value| {
        json!({
            "result": req["params"].get(0).cloned().unwrap_or(serde_json::Value::Null),
            "error": null,
            "id": req["id"],
        })
    };
    match payload {
        serde_json::Value::Array(requests) => requests.iter().map(answer).collect(),
        single => answer(single),
    }
}

#[async_trait]
impl RpcTransport for MockTransport {
    async fn send(&self, payload: serde_json::Value) -> Result<serde_json::Value, RpcError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let index = {
            let mut dispatched = self.dispatched.lock().expect("mock lock poisoned");
            dispatched.push(payload.as_array().map_or(1, Vec::len));
            dispatched.len() - 1
        };
        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.fail_on_dispatch == Some(index) {
            return Err(RpcError::InvalidResponse(format!(
                "mock failure on dispatch {index}"
            )));
        }
        Ok((self.responder)(&payload))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn endpoint(&self) -> &str {
        "mock://node"
    }
}
