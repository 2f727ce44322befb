//! Client transport abstraction.
//!
//! The terminal relay is written against a pair of frame stream/sink halves
//! rather than a concrete WebSocket type, so the same session code runs over
//! axum WebSockets in production and over in-memory channels in tests.

use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Sink, SinkExt};
use tokio::sync::Mutex;

use dockhand_core::protocol::Frame;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("transport I/O error: {0}")]
    Io(String),
}

pub type FrameStream = BoxStream<'static, Result<Frame, TransportError>>;
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = TransportError> + Send>>;

/// Both halves of a client connection.
pub struct ClientTransport {
    pub incoming: FrameStream,
    pub outgoing: FrameSink,
}

impl ClientTransport {
    pub fn new(incoming: FrameStream, outgoing: FrameSink) -> Self {
        Self { incoming, outgoing }
    }
}

/// Serialized writer over the outgoing half.
///
/// The transport allows one writer at a time; session tasks share this
/// handle and each send holds the lock for the duration of one frame.
#[derive(Clone)]
pub struct SessionWriter {
    sink: Arc<Mutex<FrameSink>>,
}

impl SessionWriter {
    pub fn new(sink: FrameSink) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    pub async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.sink.lock().await.send(frame).await
    }

    pub async fn binary(&self, data: Bytes) -> Result<(), TransportError> {
        self.send(Frame::Binary(data)).await
    }

    pub async fn text(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.send(Frame::text(text)).await
    }

    /// Report a non-fatal problem to the client as an `error: ...` text frame.
    pub async fn error(&self, message: impl std::fmt::Display) -> Result<(), TransportError> {
        self.text(format!("error: {message}")).await
    }

    /// Send a close frame and shut the sink down. Errors are ignored; the
    /// peer may already be gone.
    pub async fn close(&self) {
        let mut sink = self.sink.lock().await;
        let _ = sink.send(Frame::Close).await;
        let _ = sink.close().await;
    }
}
