//! Common error types for the stats sidecar components.

use std::fmt;

/// A specialized Result type for sidecar operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Process-level error type.
///
/// Stage errors (probe, publish) are handled inside the polling loop and
/// never reach this type; it only carries what can abort the process.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logging setup error: {0}")]
    Logging(String),
}

impl Error {
    /// Create a new configuration error.
    pub fn config(msg: impl fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new logging setup error.
    pub fn logging(msg: impl fmt::Display) -> Self {
        Error::Logging(msg.to_string())
    }
}
