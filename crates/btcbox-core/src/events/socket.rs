use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use zeromq::{Socket, SocketRecv, SubSocket};

use crate::error::SubscriberError;

/// A subscribing socket delivering multipart messages.
#[async_trait]
pub trait EventSocket: Send {
    /// Apply a prefix filter; only matching messages are delivered.
    async fn subscribe(&mut self, topic: &str) -> Result<(), SubscriberError>;

    /// Wait for the next multipart message.
    async fn recv(&mut self) -> Result<Vec<Bytes>, SubscriberError>;

    /// Tear the socket down. Later `recv` calls fail.
    async fn close(&mut self) {}
}

/// ZeroMQ SUB socket connected to the node's publisher.
pub struct ZmqEventSocket {
    socket: Option<SubSocket>,
    endpoint: String,
}

impl ZmqEventSocket {
    pub async fn connect(endpoint: &str) -> Result<Self, SubscriberError> {
        let mut socket = SubSocket::new();
        socket
            .connect(endpoint)
            .await
            .map_err(|e| SubscriberError::Socket(format!("connect to {endpoint}: {e}")))?;
        debug!(endpoint, "connected zmq sub socket");
        Ok(Self {
            socket: Some(socket),
            endpoint: endpoint.to_owned(),
        })
    }

    fn socket(&mut self) -> Result<&mut SubSocket, SubscriberError> {
        self.socket
            .as_mut()
            .ok_or_else(|| SubscriberError::Socket(format!("socket for {} is closed", self.endpoint)))
    }
}

#[async_trait]
impl EventSocket for ZmqEventSocket {
    async fn subscribe(&mut self, topic: &str) -> Result<(), SubscriberError> {
        self.socket()?
            .subscribe(topic)
            .await
            .map_err(|e| SubscriberError::Socket(format!("subscribe to `{topic}`: {e}")))
    }

    async fn recv(&mut self) -> Result<Vec<Bytes>, SubscriberError> {
        let message = self
            .socket()?
            .recv()
            .await
            .map_err(|e| SubscriberError::Socket(format!("receive: {e}")))?;
        Ok(message.into_vec())
    }

    async fn close(&mut self) {
        if self.socket.take().is_some() {
            debug!(endpoint = %self.endpoint, "closed zmq sub socket");
        }
    }
}
