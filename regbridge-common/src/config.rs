//! Bus and logging settings embedded in every bridge configuration file.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Role the bridge's Zenoh session plays in the network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZenohMode {
    #[default]
    Peer,
    Client,
    Router,
}

impl ZenohMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZenohMode::Peer => "peer",
            ZenohMode::Client => "client",
            ZenohMode::Router => "router",
        }
    }
}

impl fmt::Display for ZenohMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Zenoh session settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZenohConfig {
    #[serde(default)]
    pub mode: ZenohMode,

    /// Endpoints to dial, e.g. `tcp/10.0.0.2:7447`.
    #[serde(default)]
    pub connect: Vec<String>,

    /// Endpoints to accept connections on.
    #[serde(default)]
    pub listen: Vec<String>,
}

impl ZenohConfig {
    /// Point this configuration at a single broker/router.
    ///
    /// Adds a `tcp/<host>:<port>` connect endpoint (if not already present)
    /// and switches to client mode.
    pub fn with_broker(mut self, host: &str, port: u16) -> Self {
        let endpoint = format!("tcp/{}:{}", host, port);
        if !self.connect.contains(&endpoint) {
            self.connect.push(endpoint);
        }
        self.mode = ZenohMode::Client;
        self
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging settings. `RUST_LOG` wins over `level` when set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `zenoh_bridge_registers=debug`.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}
