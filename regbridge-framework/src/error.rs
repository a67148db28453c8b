//! Errors raised on the message-bus side.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// Settings the bus rejected before any connection was attempted.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Zenoh connection error: {0}")]
    ZenohConnection(String),

    #[error("Failed to subscribe to {topic}: {message}")]
    Subscribe { topic: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<regbridge_common::Error> for BridgeError {
    fn from(err: regbridge_common::Error) -> Self {
        match err {
            regbridge_common::Error::Zenoh(e) => Self::ZenohConnection(e.to_string()),
            other => Self::Config(other.to_string()),
        }
    }
}
