//! Configuration for the register bridge.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use regbridge_common::{LoggingConfig, ZenohConfig, validate_segment, validate_topic};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterBridgeConfig {
    /// Zenoh connection settings
    #[serde(default)]
    pub zenoh: ZenohConfig,

    /// Topics and broker
    pub bus: BusConfig,

    /// Field device and polling settings
    pub device: DeviceConfig,

    /// Registers to poll, in publish order
    #[serde(default)]
    pub registers: Vec<RegisterDefinition>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Message-bus side of the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Single broker/router to connect to, in addition to `zenoh.connect`
    #[serde(default)]
    pub broker: Option<BrokerConfig>,

    /// Topic the bridge listens on for control commands
    pub command_topic: String,

    /// Prefix for data topics (`<data_prefix>/<register name>`)
    pub data_prefix: String,
}

/// Broker address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub host: String,
    #[serde(default = "default_broker_port")]
    pub port: u16,
}

fn default_broker_port() -> u16 {
    7447
}

/// The field device the registers are read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Connection type and address
    pub connection: ConnectionConfig,

    /// Modbus unit/slave ID (1-247)
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    /// Whether configured register addresses start at 0 (true) or 1 (false)
    #[serde(default = "default_zero_based")]
    pub zero_based: bool,

    /// Poll interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retries after a timed out read
    #[serde(default = "default_retries")]
    pub retries: u32,
}

fn default_unit_id() -> u8 {
    1
}

fn default_zero_based() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_retries() -> u32 {
    2
}

impl DeviceConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Connection configuration (TCP or RTU).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConnectionConfig {
    /// Modbus TCP connection
    Tcp {
        /// Host address (IP or hostname)
        host: String,
        /// TCP port (default: 502)
        #[serde(default = "default_modbus_port")]
        port: u16,
    },
    /// Modbus RTU (serial) connection
    Rtu {
        /// Serial port path (e.g., "/dev/ttyUSB0" or "COM1")
        port: String,
        /// Baud rate (default: 9600)
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
        /// Data bits (default: 8)
        #[serde(default = "default_data_bits")]
        data_bits: u8,
        /// Parity: "none", "even", or "odd" (default: "none")
        #[serde(default = "default_parity")]
        parity: String,
        /// Stop bits: 1 or 2 (default: 1)
        #[serde(default = "default_stop_bits")]
        stop_bits: u8,
    },
}

fn default_modbus_port() -> u16 {
    502
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_data_bits() -> u8 {
    8
}

fn default_parity() -> String {
    "none".to_string()
}

fn default_stop_bits() -> u8 {
    1
}

/// One register entry from the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterDefinition {
    /// Register name, used as the data topic suffix
    pub name: String,

    /// Register address as the device documents it
    pub address: u16,

    /// Number of 16-bit words the value occupies
    pub length: u16,

    /// How the raw words are decoded
    #[serde(rename = "type")]
    pub value_type: ValueType,

    /// Arithmetic expression over `_`, the decoded raw value
    pub transform: String,

    /// Order of the 16-bit words for multi-word values
    #[serde(default)]
    pub word_order: WordOrder,

    /// Two's complement (true) or unsigned (false) integers
    #[serde(default = "default_signed")]
    pub signed: bool,
}

fn default_signed() -> bool {
    true
}

/// Numeric interpretation of a register's raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    /// Fixed-width integer (1, 2 or 4 words)
    #[serde(rename = "int")]
    Integer,
    /// IEEE-754 float (2 or 4 words)
    #[serde(rename = "float")]
    Float,
}

impl ValueType {
    /// Return the configuration name for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Integer => "int",
            ValueType::Float => "float",
        }
    }
}

/// Word order for values spanning several registers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordOrder {
    /// Most significant word first (default)
    #[default]
    Big,
    /// Least significant word first
    Little,
}

impl RegisterBridgeConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: RegisterBridgeConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Zenoh settings with the configured broker applied.
    pub fn zenoh_config(&self) -> ZenohConfig {
        match &self.bus.broker {
            Some(broker) => self.zenoh.clone().with_broker(&broker.host, broker.port),
            None => self.zenoh.clone(),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_bus()?;
        self.validate_device()?;

        let mut names = HashSet::new();
        for register in &self.registers {
            if register.name.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Register at address {}: name cannot be empty",
                    register.address
                )));
            }

            validate_segment(&register.name).map_err(|e| {
                ConfigError::Validation(format!("Register '{}': {}", register.name, e))
            })?;

            if !names.insert(register.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate register name '{}'",
                    register.name
                )));
            }

            if register.length == 0 {
                return Err(ConfigError::Validation(format!(
                    "Register '{}': length must be at least 1",
                    register.name
                )));
            }
        }

        Ok(())
    }

    fn validate_bus(&self) -> Result<(), ConfigError> {
        validate_topic(&self.bus.command_topic)
            .map_err(|e| ConfigError::Validation(format!("bus.command_topic: {}", e)))?;
        validate_topic(&self.bus.data_prefix)
            .map_err(|e| ConfigError::Validation(format!("bus.data_prefix: {}", e)))?;

        if let Some(broker) = &self.bus.broker {
            if broker.host.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "bus.broker.host cannot be empty".to_string(),
                ));
            }
            if broker.port == 0 {
                return Err(ConfigError::Validation(
                    "bus.broker.port must be non-zero".to_string(),
                ));
            }
        }

        Ok(())
    }

    fn validate_device(&self) -> Result<(), ConfigError> {
        let device = &self.device;

        if device.unit_id == 0 || device.unit_id > 247 {
            return Err(ConfigError::Validation(format!(
                "device.unit_id {} must be 1-247",
                device.unit_id
            )));
        }

        if device.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "device.poll_interval_ms must be greater than zero".to_string(),
            ));
        }

        match &device.connection {
            ConnectionConfig::Tcp { host, .. } => {
                if host.trim().is_empty() {
                    return Err(ConfigError::Validation(
                        "device.connection.host cannot be empty".to_string(),
                    ));
                }
            }
            ConnectionConfig::Rtu { port, parity, .. } => {
                if port.trim().is_empty() {
                    return Err(ConfigError::Validation(
                        "device.connection.port cannot be empty".to_string(),
                    ));
                }
                match parity.to_lowercase().as_str() {
                    "none" | "even" | "odd" => {}
                    _ => {
                        return Err(ConfigError::Validation(format!(
                            "device.connection: invalid parity '{}' (use none, even, or odd)",
                            parity
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
