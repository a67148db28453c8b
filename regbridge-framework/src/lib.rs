//! Register Bridge Framework
//!
//! Message-bus and lifecycle plumbing shared by the register bridge.
//!
//! # Overview
//!
//! This framework provides:
//! - [`Sink`] and [`MessageHandler`], the publish/subscribe contract the bridge
//!   core is written against, with [`ZenohSink`] as the production
//!   implementation and, with the `testing` feature, `MemorySink` as an
//!   in-process one
//! - [`Lifecycle`] and [`ServiceState`] for start/stop sequencing
//! - [`BridgeStatus`] for standardized status reporting
//! - [`BridgeArgs`] for CLI argument parsing
//!
//! # Example
//!
//! ```ignore
//! use regbridge_framework::{Lifecycle, Sink, ZenohSink};
//!
//! let sink = ZenohSink::connect(&zenoh_config).await?;
//! let lifecycle = Lifecycle::new();
//! lifecycle.begin_start();
//! // ... subscribe, open the field bus ...
//! lifecycle.mark_running();
//! lifecycle.stop_requested().await;
//! sink.close().await;
//! lifecycle.mark_stopped();
//! ```

mod args;
mod error;
mod lifecycle;
#[cfg(any(test, feature = "testing"))]
mod memory;
pub mod sink;
mod status;

pub use args::BridgeArgs;
pub use error::{BridgeError, Result};
pub use lifecycle::{Lifecycle, ServiceState};
#[cfg(any(test, feature = "testing"))]
pub use memory::MemorySink;
pub use sink::{MessageHandler, Sink, ZenohSink};
pub use status::{BridgeStatus, StatusPublisher};

// Re-export commonly used types from regbridge-common
pub use regbridge_common::{LoggingConfig, ZenohConfig};
