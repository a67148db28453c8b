//! Zenoh bridge for polled field-bus registers.
//!
//! Reads holding registers from a Modbus device (TCP or RTU/serial), runs
//! each value through its configured arithmetic transform and publishes the
//! result as a decimal string.
//!
//! # Topics
//!
//! ```text
//! <data_prefix>/<register_name>   transformed value, e.g. "25.0"
//! <data_prefix>/@/status          bridge status (JSON)
//! <command_topic>                 control commands ("quit")
//! ```

pub mod bridge;
pub mod catalog;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod modbus;
pub mod source;
pub mod transform;

pub use bridge::{Bridge, StartupError};
pub use catalog::Catalog;
pub use config::RegisterBridgeConfig;
