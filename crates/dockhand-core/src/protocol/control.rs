//! Terminal control messages.
//!
//! Wire format (client text frames):
//! ```text
//! {"type": "input",   "data": "ls -la\n"}
//! {"type": "resize",  "data": {"rows": 24, "cols": 80}}
//! {"type": "command", "data": "/bin/bash"}
//! ```
//! Older clients send the resize payload as a JSON-encoded string
//! (`"data": "{\"rows\":24,\"cols\":80}"`); both forms decode.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermSize {
    pub rows: u16,
    pub cols: u16,
}

/// A decoded client control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Raw keystrokes for the process's stdin.
    Input(Bytes),
    Resize(TermSize),
    /// Override the command started in the container. Only honored before
    /// the exec attachment exists.
    Command(String),
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
enum WireMessage {
    Input(String),
    Resize(ResizeData),
    Command(String),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ResizeData {
    Size(TermSize),
    Encoded(String),
}

impl ControlMessage {
    /// Decode one client text frame.
    ///
    /// Unknown `type` tags, missing fields and malformed JSON all fail with
    /// [`Error::Protocol`].
    pub fn decode(text: &str) -> Result<Self> {
        let wire: WireMessage = serde_json::from_str(text)
            .map_err(|e| Error::Protocol(format!("invalid control message: {e}")))?;
        match wire {
            WireMessage::Input(data) => Ok(Self::Input(Bytes::from(data))),
            WireMessage::Resize(ResizeData::Size(size)) => Self::resize(size),
            WireMessage::Resize(ResizeData::Encoded(raw)) => {
                let size: TermSize = serde_json::from_str(&raw)
                    .map_err(|e| Error::Protocol(format!("invalid resize payload: {e}")))?;
                Self::resize(size)
            }
            WireMessage::Command(cmd) => {
                if cmd.trim().is_empty() {
                    return Err(Error::Protocol("empty command".into()));
                }
                Ok(Self::Command(cmd))
            }
        }
    }

    fn resize(size: TermSize) -> Result<Self> {
        if size.rows == 0 || size.cols == 0 {
            return Err(Error::Protocol(format!(
                "resize dimensions must be non-zero (rows={}, cols={})",
                size.rows, size.cols
            )));
        }
        Ok(Self::Resize(size))
    }

    /// Encode as a client text frame.
    pub fn encode(&self) -> Result<String> {
        let wire = match self {
            Self::Input(data) => WireMessage::Input(String::from_utf8_lossy(data).into_owned()),
            Self::Resize(size) => WireMessage::Resize(ResizeData::Size(*size)),
            Self::Command(cmd) => WireMessage::Command(cmd.clone()),
        };
        Ok(serde_json::to_string(&wire)?)
    }
}
