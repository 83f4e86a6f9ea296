//! JSON-RPC 2.0 request envelopes.

use std::collections::HashSet;

use rand::Rng;

pub const JSONRPC_VERSION: &str = "2.0";

/// Upper bound (inclusive) of the random request id space.
pub const MAX_REQUEST_ID: u64 = 1 << 32;

/// One JSON-RPC call with a randomly assigned correlation id.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    method: String,
    params: Vec<serde_json::Value>,
    jsonrpc: &'static str,
    id: u64,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Vec<serde_json::Value>) -> Self {
        Self::with_id(method, params, random_id())
    }

    fn with_id(method: impl Into<String>, params: Vec<serde_json::Value>, id: u64) -> Self {
        Self {
            method: method.into(),
            params,
            jsonrpc: JSONRPC_VERSION,
            id,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn params(&self) -> &[serde_json::Value] {
        &self.params
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "method": self.method,
            "params": self.params,
            "jsonrpc": self.jsonrpc,
            "id": self.id,
        })
    }
}

/// An ordered group of requests sent as one JSON array.
///
/// Ids are unique within a batch; a colliding random id is redrawn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RpcBatch {
    requests: Vec<RpcRequest>,
}

impl RpcBatch {
    pub fn from_calls(calls: &[(String, Vec<serde_json::Value>)]) -> Self {
        let mut rng = rand::thread_rng();
        let mut seen = HashSet::with_capacity(calls.len());
        let requests = calls
            .iter()
            .map(|(method, params)| {
                let mut id = rng.gen_range(0..=MAX_REQUEST_ID);
                while !seen.insert(id) {
                    id = rng.gen_range(0..=MAX_REQUEST_ID);
                }
                RpcRequest::with_id(method.clone(), params.clone(), id)
            })
            .collect();
        Self { requests }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn requests(&self) -> &[RpcRequest] {
        &self.requests
    }

    pub fn methods(&self) -> Vec<&str> {
        self.requests.iter().map(RpcRequest::method).collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.requests.iter().map(RpcRequest::to_json).collect())
    }
}

fn random_id() -> u64 {
    rand::thread_rng().gen_range(0..=MAX_REQUEST_ID)
}
