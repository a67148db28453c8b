//! Service lifecycle state machine.
//!
//! ```text
//! Stopped -> Starting -> Running -> Stopping -> Stopped
//! ```
//!
//! Every transition is a compare-and-set on a single `watch` channel, so a
//! stop request and the task waiting for it can never miss each other: the
//! waiter inspects the current value before it parks.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Lifecycle state of a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl ServiceState {
    /// Return the string name for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Stopped => "stopped",
            ServiceState::Starting => "starting",
            ServiceState::Running => "running",
            ServiceState::Stopping => "stopping",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared handle on a bridge's [`ServiceState`].
///
/// Cheap to clone; all clones observe and drive the same state.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: Arc<watch::Sender<ServiceState>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Create a lifecycle in the `Stopped` state.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ServiceState::Stopped);
        Self {
            state: Arc::new(tx),
        }
    }

    /// Current state.
    pub fn state(&self) -> ServiceState {
        *self.state.borrow()
    }

    fn transition(&self, from: ServiceState, to: ServiceState) -> bool {
        let changed = self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::debug!(from = %from, to = %to, "Lifecycle transition");
        }
        changed
    }

    /// `Stopped -> Starting`. Returns false if the service was not stopped.
    pub fn begin_start(&self) -> bool {
        self.transition(ServiceState::Stopped, ServiceState::Starting)
    }

    /// `Starting -> Running`.
    pub fn mark_running(&self) -> bool {
        self.transition(ServiceState::Starting, ServiceState::Running)
    }

    /// `Running -> Stopping`.
    ///
    /// Only the first request while running has an effect; requests in any
    /// other state are ignored and return false.
    pub fn request_stop(&self) -> bool {
        self.transition(ServiceState::Running, ServiceState::Stopping)
    }

    /// Enter `Stopped` from wherever the service is.
    pub fn mark_stopped(&self) {
        let previous = self.state.send_replace(ServiceState::Stopped);
        if previous != ServiceState::Stopped {
            tracing::debug!(from = %previous, to = %ServiceState::Stopped, "Lifecycle transition");
        }
    }

    /// Wait until a stop has been requested (or the service already stopped).
    pub async fn stop_requested(&self) {
        self.wait_for(|s| matches!(s, ServiceState::Stopping | ServiceState::Stopped))
            .await
    }

    /// Wait until the service reaches `Running`.
    pub async fn running(&self) {
        self.wait_for(|s| *s == ServiceState::Running).await
    }

    async fn wait_for(&self, mut done: impl FnMut(&ServiceState) -> bool) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this only returns once `done` holds.
        let _ = rx.wait_for(|s| done(s)).await;
    }

    /// Request a stop when the process receives Ctrl+C.
    pub fn stop_on_ctrl_c(&self) -> JoinHandle<()> {
        self.stop_on_signal(tokio::signal::ctrl_c)
    }

    /// Request a stop each time `signal` resolves, until a request is accepted.
    ///
    /// Signals that arrive while the service is not running are ignored and
    /// the task keeps listening.
    pub fn stop_on_signal<F, Fut>(&self, mut signal: F) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = std::io::Result<()>> + Send,
    {
        let lifecycle = self.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = signal().await {
                    tracing::error!(error = %e, "Failed to listen for shutdown signal");
                    return;
                }
                tracing::info!("Received shutdown signal");
                if lifecycle.request_stop() {
                    return;
                }
                tracing::debug!(state = %lifecycle.state(), "Shutdown signal ignored");
            }
        })
    }
}
