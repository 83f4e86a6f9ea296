//! Response envelopes and the normalized reply shapes handed to callers.

use serde::Deserialize;

use crate::error::RpcError;

// ==============================================================================
// Response Envelope
// ==============================================================================

/// The `result` / `error` pair of one JSON-RPC response. Other members such
/// as `id` are ignored: batch responses are matched to requests by position.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl ResponseEnvelope {
    /// The error member, if present and not `null`.
    pub fn error(&self) -> Option<&serde_json::Value> {
        self.error.as_ref().filter(|err| !err.is_null())
    }

    pub fn is_error(&self) -> bool {
        self.error().is_some()
    }

    /// Convert into a `Result`, giving the error member precedence.
    pub fn into_result(self) -> Result<serde_json::Value, RpcError> {
        match self.error {
            Some(err) if !err.is_null() => Err(parse_jsonrpc_error(err)),
            _ => Ok(self.result.unwrap_or(serde_json::Value::Null)),
        }
    }
}

/// Parse a JSON-RPC error value into a structured `RpcError`.
///
/// Errors shaped as `{"code": <int>, "message": <string>}` become
/// `ServerError`; anything else falls back to `InvalidResponse`.
pub(crate) fn parse_jsonrpc_error(err: serde_json::Value) -> RpcError {
    #[derive(Deserialize)]
    struct JsonRpcError {
        code: i64,
        message: String,
    }

    match serde_json::from_value::<JsonRpcError>(err.clone()) {
        Ok(parsed) => RpcError::ServerError {
            code: parsed.code,
            message: parsed.message,
        },
        Err(_) => RpcError::InvalidResponse(format!("non-standard JSON-RPC error: {err}")),
    }
}

// ==============================================================================
// Normalized Replies
// ==============================================================================

/// Which parts of a response the caller wants back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplyMode {
    /// Only the `result` member; RPC errors are dropped.
    #[default]
    ResultOnly,
    /// Both `result` and `error`.
    WithError,
}

/// A normalized response. Missing members are reported as JSON `null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Result(serde_json::Value),
    WithError {
        result: serde_json::Value,
        error: serde_json::Value,
    },
}

impl Reply {
    fn from_envelope(envelope: ResponseEnvelope, mode: ReplyMode) -> Self {
        let result = envelope.result.unwrap_or(serde_json::Value::Null);
        match mode {
            ReplyMode::ResultOnly => Reply::Result(result),
            ReplyMode::WithError => Reply::WithError {
                result,
                error: envelope.error.unwrap_or(serde_json::Value::Null),
            },
        }
    }

    pub fn result(&self) -> &serde_json::Value {
        match self {
            Reply::Result(result) | Reply::WithError { result, .. } => result,
        }
    }

    pub fn into_result(self) -> serde_json::Value {
        match self {
            Reply::Result(result) | Reply::WithError { result, .. } => result,
        }
    }

    /// The error member when requested and not `null`.
    pub fn error(&self) -> Option<&serde_json::Value> {
        match self {
            Reply::WithError { error, .. } if !error.is_null() => Some(error),
            _ => None,
        }
    }
}

/// Normalize a single-call response.
///
/// `None` means the outcome is unknown (the exchange itself failed). It is
/// never the same as a node answering with a `null` result, which yields
/// `Some(Reply::Result(Value::Null))`.
pub fn normalize_single(response: Option<ResponseEnvelope>, mode: ReplyMode) -> Option<Reply> {
    response.map(|envelope| Reply::from_envelope(envelope, mode))
}

/// Normalize a batch response. An absent response becomes an empty list.
pub fn normalize_batch(responses: Option<Vec<ResponseEnvelope>>, mode: ReplyMode) -> Vec<Reply> {
    responses
        .unwrap_or_default()
        .into_iter()
        .map(|envelope| Reply::from_envelope(envelope, mode))
        .collect()
}
