//! Server-to-client stream events.

use serde::{Deserialize, Serialize};

/// Severity of a deploy event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Info,
    Error,
    Success,
    Warning,
}

/// One event of a deployment stream, serialized as
/// `{"type": "info", "message": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub message: String,
}

impl DeployEvent {
    pub fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(EventKind::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EventKind::Error, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(EventKind::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(EventKind::Warning, message)
    }
}

/// One line of container output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Container name the line came from.
    pub source: String,
    pub text: String,
}

impl LogLine {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }

    /// Wire rendering: `[<source>] <text>` for fan-in streams, the bare text
    /// when only one container is followed.
    pub fn render(&self, prefixed: bool) -> String {
        if prefixed {
            format!("[{}] {}", self.source, self.text)
        } else {
            self.text.clone()
        }
    }
}
