//! Publish/subscribe sink for the bridge.
//!
//! The bridge core only sees the [`Sink`] trait. [`ZenohSink`] is the
//! production implementation. With the `testing` feature,
//! [`MemorySink`](crate::MemorySink) keeps everything in process for tests.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use zenoh::Session;
use zenoh::pubsub::Subscriber;
use zenoh::sample::Sample;

use regbridge_common::ZenohConfig;

use crate::error::{BridgeError, Result};

/// Default number of outbound messages buffered before publishes are dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Receives messages for a subscribed topic.
///
/// Called on the sink's delivery thread, one message at a time per
/// subscription. Implementations must return promptly.
pub trait MessageHandler: Send + Sync + 'static {
    /// Handle one message.
    fn on_message(&self, topic: &str, payload: &str);
}

impl<F> MessageHandler for F
where
    F: Fn(&str, &str) + Send + Sync + 'static,
{
    fn on_message(&self, topic: &str, payload: &str) {
        self(topic, payload)
    }
}

/// A publish/subscribe message bus endpoint.
pub trait Sink: Send + Sync + 'static {
    /// Publish a payload on a topic.
    ///
    /// Fire-and-forget: never blocks on the network and never fails; a message
    /// that cannot be queued is dropped and logged.
    fn publish(&self, topic: &str, payload: String);

    /// Subscribe `handler` to a topic.
    fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Close the connection once queued publishes are delivered. Calling it
    /// again has no effect.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

struct Outbound {
    topic: String,
    payload: String,
}

/// [`Sink`] backed by a Zenoh session.
///
/// Publishes go through a bounded queue drained by a background task, so
/// callers on the field-bus side never wait on the network.
pub struct ZenohSink {
    session: Arc<Session>,
    outbound: Mutex<Option<mpsc::Sender<Outbound>>>,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    subscribers: tokio::sync::Mutex<Vec<Subscriber<()>>>,
}

impl ZenohSink {
    /// Open a Zenoh session and wrap it.
    pub async fn connect(config: &ZenohConfig) -> Result<Self> {
        let session = regbridge_common::connect(config).await?;

        Ok(Self::from_session(Arc::new(session), DEFAULT_QUEUE_CAPACITY))
    }

    /// Wrap an already open session.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_session(session: Arc<Session>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(forward(session.clone(), rx));

        Self {
            session,
            outbound: Mutex::new(Some(tx)),
            worker: tokio::sync::Mutex::new(Some(worker)),
            subscribers: tokio::sync::Mutex::new(Vec::new()),
        }
    }
}

async fn forward(session: Arc<Session>, mut rx: mpsc::Receiver<Outbound>) {
    while let Some(Outbound { topic, payload }) = rx.recv().await {
        match session.put(&topic, payload).await {
            Ok(()) => tracing::trace!(topic = %topic, "Published"),
            Err(e) => tracing::warn!(topic = %topic, error = %e, "Failed to publish"),
        }
    }
}

impl Sink for ZenohSink {
    fn publish(&self, topic: &str, payload: String) {
        let guard = self.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = guard.as_ref() else {
            tracing::debug!(topic = %topic, "Sink closed, dropping message");
            return;
        };

        match tx.try_send(Outbound {
            topic: topic.to_string(),
            payload,
        }) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(msg)) => {
                tracing::warn!(topic = %msg.topic, "Publish queue full, dropping message");
            }
            Err(mpsc::error::TrySendError::Closed(msg)) => {
                tracing::debug!(topic = %msg.topic, "Publish queue closed, dropping message");
            }
        }
    }

    async fn subscribe(&self, topic: &str, handler: Arc<dyn MessageHandler>) -> Result<()> {
        let subscriber = self
            .session
            .declare_subscriber(topic.to_string())
            .callback(move |sample: Sample| {
                let topic = sample.key_expr().as_str();
                match sample.payload().try_to_string() {
                    Ok(payload) => handler.on_message(topic, &payload),
                    Err(e) => {
                        tracing::warn!(topic = %topic, error = %e, "Ignoring non UTF-8 message")
                    }
                }
            })
            .await
            .map_err(|e| BridgeError::Subscribe {
                topic: topic.to_string(),
                message: e.to_string(),
            })?;

        tracing::info!(topic = %topic, "Subscribed");
        self.subscribers.lock().await.push(subscriber);
        Ok(())
    }

    async fn close(&self) {
        let sender = self
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_none() {
            return;
        }
        // Dropping the last sender lets the worker drain the queue and exit.
        drop(sender);
        if let Some(worker) = self.worker.lock().await.take() {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "Publish worker ended abnormally");
            }
        }

        let subscribers = std::mem::take(&mut *self.subscribers.lock().await);
        for subscriber in subscribers {
            if let Err(e) = subscriber.undeclare().await {
                tracing::warn!(error = %e, "Error undeclaring subscriber");
            }
        }

        if let Err(e) = self.session.close().await {
            tracing::warn!(error = %e, "Error closing Zenoh session");
        }
        tracing::info!("Zenoh session closed");
    }
}
