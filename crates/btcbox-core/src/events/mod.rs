//! Node event stream consumer.
//!
//! An [`EventSubscriber`] owns one SUB socket filtered to the topics that
//! have a handler in its [`TopicHandlers`]. Once started, a single Tokio task
//! receives three-frame messages (topic, body, sequence) and hands each body
//! to its topic's handler until [`SubscriberHandle::stop`] is called or a
//! protocol violation ends the loop.

#[cfg(test)]
pub mod mock;
mod sequence;
mod socket;
mod subscriber;
mod topic;

pub use sequence::{SequenceEvent, SequenceNumber};
pub use socket::{EventSocket, ZmqEventSocket};
pub use subscriber::{EventSubscriber, SubscriberHandle};
pub use topic::{HandlerError, Topic, TopicHandler, TopicHandlers};
