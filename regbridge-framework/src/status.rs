//! Bridge status reporting.

use serde::{Deserialize, Serialize};

use regbridge_common::status_topic;

use crate::Result;
use crate::lifecycle::ServiceState;
use crate::sink::Sink;

/// Bridge status document, published to `<prefix>/@/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeStatus {
    /// Bridge name.
    pub bridge: String,
    /// Bridge version.
    pub version: String,
    /// Current status ("running", "offline", "error").
    pub status: String,
    /// Unix epoch milliseconds when the status was produced.
    pub timestamp: i64,
    /// Additional metadata (bridge-specific).
    #[serde(flatten)]
    pub metadata: serde_json::Value,
}

impl BridgeStatus {
    fn new(bridge: impl Into<String>, version: impl Into<String>, status: &str) -> Self {
        Self {
            bridge: bridge.into(),
            version: version.into(),
            status: status.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Create a new status with "running" state.
    pub fn running(bridge: impl Into<String>, version: impl Into<String>) -> Self {
        Self::new(bridge, version, ServiceState::Running.as_str())
    }

    /// Create a status with "offline" state.
    pub fn offline(bridge: impl Into<String>, version: impl Into<String>) -> Self {
        Self::new(bridge, version, "offline")
    }

    /// Create a status with "error" state.
    pub fn error(
        bridge: impl Into<String>,
        version: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::new(bridge, version, "error").with_metadata(serde_json::json!({ "error": error.into() }))
    }

    /// Add metadata to the status.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Publish this status as JSON to `{prefix}/@/status`.
    pub fn publish<S: Sink>(&self, sink: &S, prefix: &str) -> Result<()> {
        let payload = serde_json::to_string(self)?;
        sink.publish(&status_topic(prefix), payload);
        Ok(())
    }
}

/// Publishes a bridge's status on startup and shutdown.
#[derive(Debug, Clone)]
pub struct StatusPublisher {
    prefix: String,
    bridge_name: String,
    version: String,
}

impl StatusPublisher {
    /// Create a new status publisher.
    pub fn new(
        prefix: impl Into<String>,
        bridge_name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            bridge_name: bridge_name.into(),
            version: version.into(),
        }
    }

    /// Publish "running" status with optional metadata.
    pub fn publish_running<S: Sink>(
        &self,
        sink: &S,
        metadata: Option<serde_json::Value>,
    ) -> Result<()> {
        let mut status = BridgeStatus::running(&self.bridge_name, &self.version);
        if let Some(meta) = metadata {
            status = status.with_metadata(meta);
        }
        status.publish(sink, &self.prefix)
    }

    /// Publish "offline" status.
    pub fn publish_offline<S: Sink>(&self, sink: &S) -> Result<()> {
        BridgeStatus::offline(&self.bridge_name, &self.version).publish(sink, &self.prefix)
    }

    /// Publish "error" status.
    pub fn publish_error<S: Sink>(&self, sink: &S, error: impl Into<String>) -> Result<()> {
        BridgeStatus::error(&self.bridge_name, &self.version, error).publish(sink, &self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySink;

    #[test]
    fn test_status_running() {
        let status = BridgeStatus::running("registers", "0.1.0");
        assert_eq!(status.bridge, "registers");
        assert_eq!(status.version, "0.1.0");
        assert_eq!(status.status, "running");
        assert!(status.timestamp > 0);
    }

    #[test]
    fn test_status_with_metadata() {
        let status = BridgeStatus::running("registers", "0.1.0")
            .with_metadata(serde_json::json!({ "registers": ["power", "energy"] }));

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "running");
        assert_eq!(json["registers"][1], "energy");
    }

    #[test]
    fn test_status_error() {
        let status = BridgeStatus::error("registers", "0.1.0", "serial port gone");
        assert_eq!(status.status, "error");
        assert_eq!(status.metadata["error"], "serial port gone");
    }

    #[test]
    fn test_publisher_topics() {
        let sink = MemorySink::new();
        let publisher = StatusPublisher::new("wattnode/data", "registers", "0.1.0");

        publisher.publish_running(&sink, None).unwrap();
        publisher.publish_offline(&sink).unwrap();

        let payloads = sink.published_to("wattnode/data/@/status");
        assert_eq!(payloads.len(), 2);

        let first: BridgeStatus = serde_json::from_str(&payloads[0]).unwrap();
        let second: BridgeStatus = serde_json::from_str(&payloads[1]).unwrap();
        assert_eq!(first.status, "running");
        assert_eq!(second.status, "offline");
    }
}
