//! Error types for the economy core

use thiserror::Error;

/// Result type for economy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Economy core errors
#[derive(Error, Debug)]
pub enum Error {
    /// Store error (embedded SQL engine)
    #[error("Store error: {0}")]
    Store(String),

    /// Store query exceeded its configured timeout
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Stored value could not be decoded (bad decimal, bad uuid)
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// Account not found
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Concurrency error (writer mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Store(err.to_string())
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
