#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("RPC communication failure: {0}")]
    Rpc(#[from] RpcError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid node data: {0}")]
    Parse(String),

    #[error("event subscriber failure: {0}")]
    Subscriber(#[from] SubscriberError),
}

/// Failures of a single JSON-RPC exchange or of a whole batch.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid JSON-RPC response: {0}")]
    InvalidResponse(String),

    #[error("batch response has {actual} entries, expected {expected}")]
    BatchLength { expected: usize, actual: usize },

    #[error("JSON-RPC server error {code}: {message}")]
    ServerError { code: i64, message: String },

    #[error("RPC session is closed")]
    SessionClosed,
}

/// Failures that terminate the event subscriber loop.
#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error("received message on unsubscribed topic `{0}`")]
    UnexpectedTopic(String),

    #[error("malformed event message: expected 3 frames, got {frames}")]
    MalformedMessage { frames: usize },

    #[error("event socket error: {0}")]
    Socket(String),

    #[error("event subscriber task failed: {0}")]
    Task(String),

    #[error("invalid sequence body: {0}")]
    SequenceBody(String),
}
