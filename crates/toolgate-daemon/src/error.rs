//! Error types for the toolgate daemon.

use thiserror::Error;

/// Errors that can occur in the daemon.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// I/O error (file operations, socket binding).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Secret storage error.
    #[error("Secret storage error: {0}")]
    Storage(String),

    /// Generic error with context.
    #[error("{0}")]
    Other(String),
}

/// Result type alias using `DaemonError`.
pub type Result<T> = std::result::Result<T, DaemonError>;

impl From<anyhow::Error> for DaemonError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
