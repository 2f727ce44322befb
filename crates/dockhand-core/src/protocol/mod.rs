//! Client-facing relay protocol.
//!
//! - `control`: terminal control messages sent by the client as text frames.
//! - `frame`: transport-neutral frame type shared by all client transports.
//! - `events`: server-to-client deploy events and log lines.
//! - `stdframe`: decoder for the engine's multiplexed stdout/stderr stream.

pub mod control;
pub mod events;
pub mod frame;
pub mod stdframe;

pub use control::{ControlMessage, TermSize};
pub use events::{DeployEvent, EventKind, LogLine};
pub use frame::Frame;
pub use stdframe::{StdFrame, StdFrameDecoder, StdStream};
