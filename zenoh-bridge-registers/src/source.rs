//! Field-bus value source contract.
//!
//! A value source polls the device on its own task and hands every result to
//! a [`SourceListener`]. Calls into the listener come from that task, one at
//! a time, concurrently with anything happening on the message-bus side.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::catalog::RegisterDescriptor;

/// A register could not be scheduled for polling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("Register '{name}': address {address} is not valid for a one-based device")]
    InvalidAddress { name: String, address: u16 },
    #[error("Register '{name}': {length} words at address {address} run past the end of the address space")]
    OutOfRange {
        name: String,
        address: u16,
        length: u16,
    },
    #[error("Register '{name}': {length} words exceeds the {max}-word read limit")]
    TooLong { name: String, length: u16, max: u16 },
    #[error("Register '{name}' overlaps register '{other}'")]
    Overlap { name: String, other: String },
}

/// The device could not be reached.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Invalid device address: {0}")]
    Address(String),
    #[error("Connection to {target} timed out")]
    Timeout { target: String },
    #[error("Failed to connect to {target}: {message}")]
    Failed { target: String, message: String },
}

/// A poll failed at the transport level.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Reconnect failed: {0}")]
    Reconnect(#[from] ConnectionError),
    #[error("Read of '{register}' timed out after {attempts} attempt(s)")]
    Timeout { register: String, attempts: u32 },
    #[error("Read of '{register}' failed: {message}")]
    Read { register: String, message: String },
    #[error("Device rejected read of '{register}': {exception}")]
    Exception { register: String, exception: String },
}

impl TransportError {
    /// Whether the connection should be dropped and re-established.
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout { .. } | TransportError::Read { .. }
        )
    }
}

/// Receives poll results from a [`ValueSource`].
pub trait SourceListener: Send + Sync + 'static {
    /// One register was read successfully.
    fn on_value(&self, register: &RegisterDescriptor, raw: &[u8]);

    /// A poll failed at the transport level. Polling continues.
    fn on_error(&self, error: &TransportError);
}

/// A polled field-bus connection.
pub trait ValueSource: Send + 'static {
    /// Open the transport.
    fn connect(&mut self) -> impl Future<Output = Result<(), ConnectionError>> + Send;

    /// Schedule a register for polling.
    fn register_poll(&mut self, register: Arc<RegisterDescriptor>)
    -> Result<(), RegistrationError>;

    /// Set the time between poll cycles.
    fn set_poll_interval(&mut self, interval: Duration);

    /// Begin polling, delivering results to `listener`.
    ///
    /// Must be called from within a Tokio runtime.
    fn start(&mut self, listener: Arc<dyn SourceListener>);

    /// Stop polling and close the transport. Calling it again has no effect.
    fn stop(&mut self) -> impl Future<Output = ()> + Send;
}
