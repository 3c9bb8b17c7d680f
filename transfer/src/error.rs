//! Error types for the transfer crate

use thiserror::Error;

/// Result type for transfer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Transfer crate errors
///
/// Rejections of individual transfers are values ([`economy_core::OpError`]),
/// not errors; this enum covers infrastructure failures only.
#[derive(Error, Debug)]
pub enum Error {
    /// Failure in the economy core
    #[error(transparent)]
    Core(#[from] economy_core::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
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
