//! Error types for the sync bus

use thiserror::Error;

/// Result type for sync bus operations
pub type Result<T> = std::result::Result<T, Error>;

/// Sync bus errors
#[derive(Error, Debug)]
pub enum Error {
    /// Connection to the broker failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Publish failed
    #[error("Publish error: {0}")]
    Publish(String),

    /// Subscribe failed
    #[error("Subscribe error: {0}")]
    Subscribe(String),

    /// Envelope could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Connection(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
