//! Container engine collaborator.
//!
//! The relay core only needs a narrow slice of the engine API: inspect,
//! interactive exec, logs and label-filtered listing. `ContainerEngine`
//! captures exactly that slice so sessions can be driven by the Docker
//! implementation in production and by an in-memory engine in tests.

mod docker;

pub use docker::DockerEngine;

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use tokio::io::AsyncWrite;

/// Raw bytes coming out of the engine.
pub type ByteStream = BoxStream<'static, Result<Bytes, EngineError>>;

/// Write side of an interactive exec (the process's stdin).
pub type EngineInput = Pin<Box<dyn AsyncWrite + Send>>;

/// Errors from engine calls.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("No such container or exec instance: {0}")]
    NotFound(String),

    #[error("Engine unreachable: {0}")]
    Unavailable(String),

    #[error("Engine API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Engine stream error: {0}")]
    Stream(String),
}

/// Result of `inspect`.
#[derive(Debug, Clone, Default)]
pub struct ContainerInfo {
    pub id: String,
    /// Container name without the leading `/`.
    pub name: String,
    pub running: bool,
    pub labels: HashMap<String, String>,
}

/// One row of `list_containers`.
#[derive(Debug, Clone, Default)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    /// Engine state string, e.g. `running`, `exited`.
    pub state: String,
    pub labels: HashMap<String, String>,
}

impl ContainerSummary {
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

/// Options for `logs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogOptions {
    pub stdout: bool,
    pub stderr: bool,
    pub follow: bool,
    /// Replay only the last `n` lines; `None` replays everything.
    pub tail: Option<u32>,
}

impl LogOptions {
    /// stdout + stderr, follow, last `tail` lines.
    pub const fn follow_tail(tail: u32) -> Self {
        Self {
            stdout: true,
            stderr: true,
            follow: true,
            tail: Some(tail),
        }
    }
}

/// How the bytes of an [`EngineLogStream`] are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFraming {
    /// stdout/stderr interleaved behind 8-byte headers (container without TTY).
    Multiplexed,
    /// Plain payload bytes.
    Raw,
}

/// A container's log output.
pub struct EngineLogStream {
    pub framing: LogFraming,
    pub bytes: ByteStream,
}

/// An attached interactive exec.
pub struct ExecAttachment {
    pub output: ByteStream,
    pub input: EngineInput,
}

/// The engine operations used by the relay core.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    async fn inspect(&self, container_id: &str) -> Result<ContainerInfo, EngineError>;

    /// Create an exec instance; returns its id.
    async fn exec_create(
        &self,
        container_id: &str,
        cmd: Vec<String>,
        tty: bool,
    ) -> Result<String, EngineError>;

    /// Start an exec with stdin attached.
    async fn exec_attach(&self, exec_id: &str) -> Result<ExecAttachment, EngineError>;

    async fn exec_resize(&self, exec_id: &str, rows: u16, cols: u16) -> Result<(), EngineError>;

    /// Start an exec without stdin and collect its combined output.
    async fn exec_collect(&self, exec_id: &str) -> Result<String, EngineError>;

    async fn logs(
        &self,
        container_id: &str,
        options: LogOptions,
    ) -> Result<EngineLogStream, EngineError>;

    /// List containers carrying `label` (`key=value`), including stopped ones
    /// when `all` is set.
    async fn list_containers(
        &self,
        label: &str,
        all: bool,
    ) -> Result<Vec<ContainerSummary>, EngineError>;

    /// Cheap reachability probe.
    async fn ping(&self) -> Result<(), EngineError>;
}
