use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::CoreError;

/// Error type returned by event handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

// ==============================================================================
// Topic
// ==============================================================================

/// Event stream topics published by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    HashBlock,
    HashTx,
    RawBlock,
    RawTx,
    Sequence,
}

impl Topic {
    pub const ALL: [Topic; 5] = [
        Topic::HashBlock,
        Topic::HashTx,
        Topic::RawBlock,
        Topic::RawTx,
        Topic::Sequence,
    ];

    /// Wire name, also used as the subscription filter.
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::HashBlock => "hashblock",
            Topic::HashTx => "hashtx",
            Topic::RawBlock => "rawblock",
            Topic::RawTx => "rawtx",
            Topic::Sequence => "sequence",
        }
    }

    pub fn from_bytes(name: &[u8]) -> Option<Topic> {
        Topic::ALL
            .into_iter()
            .find(|topic| topic.as_str().as_bytes() == name)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::from_bytes(s.as_bytes()).ok_or_else(|| {
            CoreError::Config(format!(
                "unknown topic `{s}`; expected one of hashblock, hashtx, rawblock, rawtx, sequence"
            ))
        })
    }
}

// ==============================================================================
// Handlers
// ==============================================================================

/// Receives the body of every message published on one topic.
#[async_trait]
pub trait TopicHandler: Send + Sync {
    async fn handle(&self, body: Bytes) -> Result<(), HandlerError>;
}

#[async_trait]
impl<F, Fut> TopicHandler for F
where
    F: Fn(Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, body: Bytes) -> Result<(), HandlerError> {
        (self)(body).await
    }
}

/// Topic to handler mapping. Only topics present here are subscribed to.
#[derive(Clone, Default)]
pub struct TopicHandlers {
    handlers: BTreeMap<Topic, Arc<dyn TopicHandler>>,
}

impl TopicHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `topic`, replacing any earlier one.
    pub fn on(mut self, topic: Topic, handler: impl TopicHandler + 'static) -> Self {
        self.handlers.insert(topic, Arc::new(handler));
        self
    }

    pub fn get(&self, topic: Topic) -> Option<&Arc<dyn TopicHandler>> {
        self.handlers.get(&topic)
    }

    pub fn topics(&self) -> impl Iterator<Item = Topic> + '_ {
        self.handlers.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for TopicHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.topics()).finish()
    }
}
