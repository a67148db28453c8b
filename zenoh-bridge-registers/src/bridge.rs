//! Service lifecycle: wires the sink, the value source and the catalog together.

use std::sync::Arc;

use regbridge_framework::{BridgeError, Lifecycle, ServiceState, Sink, StatusPublisher};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::catalog::{Catalog, CatalogError};
use crate::command::CommandHandler;
use crate::config::RegisterBridgeConfig;
use crate::dispatcher::Dispatcher;
use crate::source::{ConnectionError, ValueSource};

/// Name reported in status documents.
pub const BRIDGE_NAME: &str = "registers";

/// The bridge could not reach `Running`.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: bridge is {0}, not stopped")]
    AlreadyStarted(ServiceState),
    #[error("Connection error: {0}")]
    Sink(#[source] BridgeError),
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("Configuration error: {0}")]
    Catalog(#[from] CatalogError),
}

impl StartupError {
    /// Either "configuration" or "connection".
    pub fn category(&self) -> &'static str {
        match self {
            StartupError::AlreadyStarted(_) | StartupError::Catalog(_) => "configuration",
            StartupError::Sink(BridgeError::Config(_)) => "configuration",
            StartupError::Sink(_) | StartupError::Connection(_) => "connection",
        }
    }
}

/// A register bridge over a value source `V` and a sink `S`.
pub struct Bridge<V: ValueSource, S: Sink> {
    config: RegisterBridgeConfig,
    source: V,
    sink: Arc<S>,
    lifecycle: Lifecycle,
    status: StatusPublisher,
}

impl<V: ValueSource, S: Sink> Bridge<V, S> {
    pub fn new(config: RegisterBridgeConfig, source: V, sink: Arc<S>) -> Self {
        let status = StatusPublisher::new(
            config.bus.data_prefix.clone(),
            BRIDGE_NAME,
            env!("CARGO_PKG_VERSION"),
        );
        Self {
            config,
            source,
            sink,
            lifecycle: Lifecycle::new(),
            status,
        }
    }

    /// Handle for observing or driving the lifecycle from elsewhere.
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// `Stopped -> Starting -> Running`.
    ///
    /// On failure everything opened so far is closed again and the bridge
    /// is left `Stopped`.
    pub async fn start(&mut self) -> Result<(), StartupError> {
        if !self.lifecycle.begin_start() {
            return Err(StartupError::AlreadyStarted(self.lifecycle.state()));
        }
        info!(
            command_topic = %self.config.bus.command_topic,
            data_prefix = %self.config.bus.data_prefix,
            "Starting register bridge"
        );

        let catalog = match self.open().await {
            Ok(catalog) => catalog,
            Err(e) => {
                error!(category = e.category(), "Startup failed: {}", e);
                let detail = e.to_string();
                if let Err(status_err) = self.status.publish_error(self.sink.as_ref(), detail) {
                    warn!("Failed to publish status: {}", status_err);
                }
                self.release().await;
                self.lifecycle.mark_stopped();
                return Err(e);
            }
        };

        let metadata = serde_json::json!({ "registers": catalog.names() });
        if let Err(e) = self.status.publish_running(self.sink.as_ref(), Some(metadata)) {
            warn!("Failed to publish status: {}", e);
        }

        self.lifecycle.mark_running();
        info!(registers = catalog.len(), "Register bridge running");
        Ok(())
    }

    async fn open(&mut self) -> Result<Catalog, StartupError> {
        let handler = Arc::new(CommandHandler::new(self.lifecycle.clone()));
        self.sink
            .subscribe(&self.config.bus.command_topic, handler)
            .await
            .map_err(StartupError::Sink)?;

        self.source.connect().await?;

        let catalog = Catalog::build(&self.config.registers, &mut self.source)?;
        self.source
            .set_poll_interval(self.config.device.poll_interval());

        let dispatcher = Dispatcher::new(self.sink.clone(), self.config.bus.data_prefix.clone());
        self.source.start(Arc::new(dispatcher));

        Ok(catalog)
    }

    async fn release(&mut self) {
        self.sink.close().await;
        self.source.stop().await;
    }

    /// Block until a stop is requested, then run `Stopping -> Stopped`.
    ///
    /// Returns immediately if the bridge is not running.
    pub async fn wait_until_stopped(&mut self) {
        self.lifecycle.stop_requested().await;
        if self.lifecycle.state() == ServiceState::Stopped {
            return;
        }

        info!("Stopping register bridge");
        if let Err(e) = self.status.publish_offline(self.sink.as_ref()) {
            warn!("Failed to publish status: {}", e);
        }
        self.release().await;
        self.lifecycle.mark_stopped();
        info!("Register bridge stopped");
    }

    /// Start, then wait for the stop to complete.
    pub async fn run(&mut self) -> Result<(), StartupError> {
        self.start().await?;
        self.wait_until_stopped().await;
        Ok(())
    }
}
