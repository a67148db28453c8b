use thiserror::Error;

/// Common error type for register bridge components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Zenoh error: {0}")]
    Zenoh(#[from] zenoh::Error),

    #[error("Invalid topic '{topic}': {reason}")]
    Topic { topic: String, reason: String },
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
