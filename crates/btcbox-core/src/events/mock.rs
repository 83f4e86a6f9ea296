use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::SubscriberError;

use super::socket::EventSocket;

/// A channel-backed socket for testing. Messages pushed through the paired
/// [`MockPublisher`] are delivered unfiltered, so tests can also simulate a
/// misbehaving peer.
pub struct MockEventSocket {
    rx: mpsc::UnboundedReceiver<Vec<Bytes>>,
    subscriptions: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

pub struct MockPublisher {
    tx: mpsc::UnboundedSender<Vec<Bytes>>,
    subscriptions: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl MockEventSocket {
    pub fn new() -> (Self, MockPublisher) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscriptions = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        (
            Self {
                rx,
                subscriptions: Arc::clone(&subscriptions),
                closed: Arc::clone(&closed),
            },
            MockPublisher {
                tx,
                subscriptions,
                closed,
            },
        )
    }
}

impl MockPublisher {
    pub fn publish(&self, frames: Vec<Bytes>) {
        self.tx.send(frames).expect("mock socket must still be receiving");
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().expect("mock lock poisoned").clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSocket for MockEventSocket {
    async fn subscribe(&mut self, topic: &str) -> Result<(), SubscriberError> {
        self.subscriptions
            .lock()
            .expect("mock lock poisoned")
            .push(topic.to_owned());
        Ok(())
    }

    async fn recv(&mut self) -> Result<Vec<Bytes>, SubscriberError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SubscriberError::Socket("mock socket closed".to_owned()));
        }
        self.rx
            .recv()
            .await
            .ok_or_else(|| SubscriberError::Socket("mock publisher dropped".to_owned()))
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        self.rx.close();
    }
}
