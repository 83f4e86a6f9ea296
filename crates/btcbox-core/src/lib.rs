pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod parser;
pub mod rpc;
#[cfg(test)]
mod test_util;

pub use client::NodeClient;
pub use config::RpcConfig;
pub use error::{CoreError, RpcError, SubscriberError};
pub use events::{EventSubscriber, SubscriberHandle, Topic, TopicHandlers};
pub use rpc::{Reply, ReplyMode, ResponseEnvelope};
