//! Transport-neutral client frames.

use bytes::Bytes;

/// One frame on a client connection.
///
/// WebSocket text/binary/close messages map onto these one-to-one; pings
/// and pongs are handled by the transport and never surface here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
    Close,
}

impl Frame {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub const fn is_close(&self) -> bool {
        matches!(self, Self::Close)
    }
}
