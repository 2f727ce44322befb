//! Relay module: bridges container engine streams with client connections.
//!
//! This is the glue that connects:
//! - `ContainerEngine` (exec attachments, log streams)
//! - `ClientTransport` (WebSocket frames or server-push channels)
//! - `Completion` (exactly-once session teardown)

mod completion;
mod lines;
mod logs;
mod terminal;
mod transport;

pub use completion::{Completion, CompletionReason};
pub(crate) use lines::{MAX_LINE_LEN, decode_line, read_line};
pub use logs::{LogAggregator, LogSession};
pub use terminal::{ExecOutput, TerminalRelay, TerminalSession, TerminalTarget, split_command};
pub use transport::{ClientTransport, FrameSink, FrameStream, SessionWriter, TransportError};
