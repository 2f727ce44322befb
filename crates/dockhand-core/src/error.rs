//! Error types for `Dockhand` core library.

use thiserror::Error;

/// Result type alias using `Dockhand` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `Dockhand` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed client control frame
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parse error (project specifications)
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
