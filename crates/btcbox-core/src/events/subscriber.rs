use std::any::Any;
use std::panic::AssertUnwindSafe;

use bitcoin::hex::DisplayHex;
use bytes::Bytes;
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

use crate::error::{CoreError, SubscriberError};

use super::sequence::SequenceNumber;
use super::socket::{EventSocket, ZmqEventSocket};
use super::topic::{Topic, TopicHandlers};

/// A socket subscribed to the topics of a [`TopicHandlers`] mapping, ready
/// to be started.
pub struct EventSubscriber {
    socket: Box<dyn EventSocket>,
    handlers: TopicHandlers,
    endpoint: String,
}

impl EventSubscriber {
    /// Connect a ZeroMQ SUB socket to `endpoint` (e.g. `tcp://127.0.0.1:28332`)
    /// and subscribe to every topic that has a handler.
    pub async fn connect(endpoint: &str, handlers: TopicHandlers) -> Result<Self, CoreError> {
        ensure_handlers(&handlers)?;
        let socket = ZmqEventSocket::connect(endpoint).await?;
        Self::with_socket(Box::new(socket), handlers, endpoint).await
    }

    /// Subscribe an already-connected socket.
    pub async fn with_socket(
        mut socket: Box<dyn EventSocket>,
        handlers: TopicHandlers,
        endpoint: impl Into<String>,
    ) -> Result<Self, CoreError> {
        ensure_handlers(&handlers)?;
        let endpoint = endpoint.into();
        for topic in handlers.topics() {
            socket.subscribe(topic.as_str()).await?;
            debug!(endpoint = %endpoint, %topic, "subscribed to topic");
        }

        Ok(Self {
            socket,
            handlers,
            endpoint,
        })
    }

    pub fn topics(&self) -> impl Iterator<Item = Topic> + '_ {
        self.handlers.topics()
    }

    /// Spawn the receive loop on the current Tokio runtime.
    pub fn start(self) -> SubscriberHandle {
        self.start_on(&Handle::current())
    }

    /// Spawn the receive loop on `runtime`.
    pub fn start_on(self, runtime: &Handle) -> SubscriberHandle {
        let token = CancellationToken::new();
        let task = runtime.spawn(run(
            self.socket,
            self.handlers,
            self.endpoint,
            token.clone(),
        ));
        SubscriberHandle {
            guard: token.clone().drop_guard(),
            token,
            task,
        }
    }
}

fn ensure_handlers(handlers: &TopicHandlers) -> Result<(), CoreError> {
    if handlers.is_empty() {
        return Err(CoreError::Config(
            "event subscriber needs at least one topic handler".to_owned(),
        ));
    }
    Ok(())
}

/// Owner of a running receive loop.
///
/// Dropping the handle stops the loop.
pub struct SubscriberHandle {
    token: CancellationToken,
    guard: DropGuard,
    task: JoinHandle<Result<(), SubscriberError>>,
}

impl SubscriberHandle {
    /// Ask the loop to stop. Idempotent; a pending receive is abandoned and
    /// the socket closed.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// A token that stops the loop when cancelled, for use from other tasks.
    pub fn stop_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to end. Returns the fatal error that ended it, or
    /// `Ok(())` after a requested stop.
    pub async fn join(self) -> Result<(), SubscriberError> {
        let SubscriberHandle { task, guard, .. } = self;
        let outcome = task.await;
        drop(guard);
        match outcome {
            Ok(result) => result,
            Err(err) => Err(SubscriberError::Task(err.to_string())),
        }
    }

    /// Stop the loop and wait for it to end.
    pub async fn shutdown(self) -> Result<(), SubscriberError> {
        self.stop();
        self.join().await
    }
}

async fn run(
    mut socket: Box<dyn EventSocket>,
    handlers: TopicHandlers,
    endpoint: String,
    token: CancellationToken,
) -> Result<(), SubscriberError> {
    info!(endpoint = %endpoint, topics = ?handlers, "event subscriber running");

    let result = loop {
        let received = tokio::select! {
            biased;
            _ = token.cancelled() => break Ok(()),
            received = socket.recv() => received,
        };

        let frames = match received {
            Ok(frames) => frames,
            Err(_) if token.is_cancelled() => break Ok(()),
            Err(err) => break Err(err),
        };

        if let Err(err) = dispatch(&handlers, frames).await {
            break Err(err);
        }
    };

    socket.close().await;
    match &result {
        Ok(()) => info!(endpoint = %endpoint, "event subscriber stopped"),
        Err(err) => error!(endpoint = %endpoint, error = %err, "event subscriber terminated"),
    }
    result
}

/// Hand one multipart message to its topic handler.
///
/// Only protocol violations are returned; handler failures are logged so the
/// loop always goes on to the next receive.
async fn dispatch(handlers: &TopicHandlers, frames: Vec<Bytes>) -> Result<(), SubscriberError> {
    let [topic_frame, body, sequence_frame]: [Bytes; 3] = frames
        .try_into()
        .map_err(|frames: Vec<Bytes>| SubscriberError::MalformedMessage {
            frames: frames.len(),
        })?;
    let sequence = SequenceNumber::decode(&sequence_frame);

    let Some((topic, handler)) =
        Topic::from_bytes(&topic_frame).and_then(|topic| Some((topic, handlers.get(topic)?)))
    else {
        return Err(SubscriberError::UnexpectedTopic(
            String::from_utf8_lossy(&topic_frame).into_owned(),
        ));
    };

    debug!(
        %topic,
        %sequence,
        body_len = body.len(),
        body = %body.as_hex(),
        "event received"
    );

    match AssertUnwindSafe(handler.handle(body)).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(%topic, %sequence, error = %err, "event handler failed"),
        Err(panic) => error!(
            %topic,
            %sequence,
            panic = panic_message(panic.as_ref()),
            "event handler panicked"
        ),
    }
    Ok(())
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
