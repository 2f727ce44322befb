//! Daemon error type shared by the relay, deploy and server layers.

use crate::deploy::RunnerError;
use crate::engine::EngineError;

/// Errors surfaced to clients.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Container {0} is not running")]
    NotRunning(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Container engine unavailable: {0}")]
    Unavailable(String),

    #[error("Process failed: {0}")]
    ProcessFailure(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The client went away before the session was established.
    #[error("Client disconnected")]
    Disconnected,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<EngineError> for RelayError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound(msg) => Self::NotFound(msg),
            EngineError::Unavailable(msg) => Self::Unavailable(msg),
            EngineError::Api { status: 409, message } => Self::NotRunning(message),
            EngineError::Api { status, message } => {
                Self::Internal(format!("engine returned {status}: {message}"))
            }
            EngineError::Stream(msg) => Self::Internal(msg),
        }
    }
}

impl From<RunnerError> for RelayError {
    fn from(err: RunnerError) -> Self {
        Self::ProcessFailure(err.to_string())
    }
}

impl From<dockhand_core::Error> for RelayError {
    fn from(err: dockhand_core::Error) -> Self {
        match err {
            dockhand_core::Error::Protocol(msg) => Self::Protocol(msg),
            dockhand_core::Error::Yaml(e) => Self::InvalidInput(format!("invalid YAML: {e}")),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            std::io::ErrorKind::AlreadyExists => Self::Conflict(err.to_string()),
            _ => Self::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_client_categories() {
        assert!(matches!(
            RelayError::from(EngineError::NotFound("x".into())),
            RelayError::NotFound(_)
        ));
        assert!(matches!(
            RelayError::from(EngineError::Unavailable("socket".into())),
            RelayError::Unavailable(_)
        ));
        assert!(matches!(
            RelayError::from(EngineError::Api {
                status: 500,
                message: "boom".into()
            }),
            RelayError::Internal(_)
        ));
    }

    #[test]
    fn protocol_error_passes_through() {
        let err = RelayError::from(dockhand_core::Error::Protocol("bad frame".into()));
        assert!(matches!(err, RelayError::Protocol(m) if m == "bad frame"));
    }
}
