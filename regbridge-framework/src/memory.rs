//! In-process [`Sink`] for tests, enabled by the `testing` feature.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{BridgeError, Result};
use crate::sink::{MessageHandler, Sink};

/// In-process [`Sink`].
///
/// Records every publish and routes [`MemorySink::deliver`] calls to the
/// handlers subscribed on exactly that topic.
#[derive(Default)]
pub struct MemorySink {
    published: Mutex<Vec<(String, String)>>,
    handlers: Mutex<Vec<(String, Arc<dyn MessageHandler>)>>,
    closes: AtomicUsize,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in order.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Payloads published on one topic, in order.
    pub fn published_to(&self, topic: &str) -> Vec<String> {
        self.published()
            .into_iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, payload)| payload)
            .collect()
    }

    /// Deliver a message to the handlers subscribed on `topic`.
    ///
    /// Returns the number of handlers invoked.
    pub fn deliver(&self, topic: &str, payload: &str) -> usize {
        let handlers: Vec<_> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, h)| h.clone())
            .collect();

        for handler in &handlers {
            handler.on_message(topic, payload);
        }
        handlers.len()
    }

    /// Number of times [`Sink::close`] actually closed the sink.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Whether the sink has been closed.
    pub fn is_closed(&self) -> bool {
        self.close_count() > 0
    }
}

impl Sink for MemorySink {
    fn publish(&self, topic: &str, payload: String) {
        if self.is_closed() {
            tracing::debug!(topic = %topic, "Sink closed, dropping message");
            return;
        }
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((topic.to_string(), payload));
    }

    async fn subscribe(&self, topic: &str, handler: Arc<dyn MessageHandler>) -> Result<()> {
        regbridge_common::validate_topic(topic).map_err(|e| BridgeError::Subscribe {
            topic: topic.to_string(),
            message: e.to_string(),
        })?;
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((topic.to_string(), handler));
        Ok(())
    }

    async fn close(&self) {
        if self
            .closes
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.handlers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }
    }
}
