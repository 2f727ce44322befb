//! Interactive terminal sessions.
//!
//! Data flow:
//! ```text
//! client frames → ControlMessage → exec stdin / exec_resize
//! exec output   → chunked reads  → binary frames → client
//! ```
//!
//! A session runs one output task and one input task. The first one to hit
//! a terminal condition completes the session; the other notices at its next
//! await point. Both are joined before the exec stdin is shut down and the
//! client transport is closed.

use std::sync::Arc;

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt, stream};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;
use tracing::{debug, info, warn};

use dockhand_core::config::TerminalConfig;
use dockhand_core::protocol::{ControlMessage, Frame};

use super::completion::{Completion, CompletionReason};
use super::transport::{ClientTransport, FrameStream, SessionWriter};
use crate::engine::{ByteStream, ContainerEngine, EngineInput};
use crate::error::RelayError;

/// A running container a terminal can be opened in.
#[derive(Debug, Clone)]
pub struct TerminalTarget {
    pub container_id: String,
    pub name: String,
}

/// Output of a one-shot exec.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecOutput {
    pub container_id: String,
    pub command: String,
    pub output: String,
}

/// Opens terminal sessions and one-shot execs against an engine.
pub struct TerminalRelay {
    engine: Arc<dyn ContainerEngine>,
    config: TerminalConfig,
}

impl TerminalRelay {
    pub fn new(engine: Arc<dyn ContainerEngine>, config: TerminalConfig) -> Self {
        Self { engine, config }
    }

    /// Check that `container_id` exists and is running.
    ///
    /// Kept separate from [`attach`](Self::attach) so HTTP callers can fail
    /// with a status code before upgrading the connection.
    pub async fn prepare(&self, container_id: &str) -> Result<TerminalTarget, RelayError> {
        let info = self.engine.inspect(container_id).await?;
        if !info.running {
            return Err(RelayError::NotRunning(container_id.to_string()));
        }
        let name = if info.name.is_empty() {
            container_id.to_string()
        } else {
            info.name
        };
        Ok(TerminalTarget {
            container_id: info.id,
            name,
        })
    }

    /// Resolve the command, create and attach the exec, and greet the client.
    ///
    /// Failures after this point are reported to the client as an error frame
    /// and the transport is closed.
    pub async fn attach(
        &self,
        target: TerminalTarget,
        initial_command: Option<String>,
        transport: ClientTransport,
    ) -> Result<TerminalSession, RelayError> {
        let ClientTransport {
            mut incoming,
            outgoing,
        } = transport;
        let writer = SessionWriter::new(outgoing);
        let session_id = uuid::Uuid::new_v4().to_string();

        let mut pending = Vec::new();
        let command = match initial_command.filter(|c| !c.trim().is_empty()) {
            Some(cmd) => cmd,
            None => {
                match self.await_command(&mut incoming, &mut pending).await {
                    Ok(cmd) => cmd,
                    Err(e) => {
                        writer.close().await;
                        return Err(e);
                    }
                }
            }
        };

        let attached = async {
            let exec_id = self
                .engine
                .exec_create(&target.container_id, split_command(&command), true)
                .await?;
            let attachment = self.engine.exec_attach(&exec_id).await?;
            Ok::<_, RelayError>((exec_id, attachment))
        }
        .await;
        let (exec_id, attachment) = match attached {
            Ok(v) => v,
            Err(e) => {
                warn!(session_id, container_id = %target.container_id, error = %e, "Exec attach failed");
                let _ = writer.error(&e).await;
                writer.close().await;
                return Err(e);
            }
        };

        if writer
            .text(format!("connected to {}", target.name))
            .await
            .is_err()
        {
            return Err(RelayError::Disconnected);
        }
        info!(session_id, container_id = %target.container_id, %command, exec_id, "Terminal attached");

        let incoming = stream::iter(pending.into_iter().map(Ok))
            .chain(incoming)
            .boxed();
        Ok(TerminalSession {
            session_id,
            container_id: target.container_id,
            exec_id,
            engine: Arc::clone(&self.engine),
            chunk_size: self.config.chunk_size.max(1),
            output: attachment.output,
            input: attachment.input,
            incoming,
            writer,
            completion: Completion::new(),
        })
    }

    /// [`prepare`](Self::prepare) followed by [`attach`](Self::attach).
    pub async fn open_terminal(
        &self,
        container_id: &str,
        initial_command: Option<String>,
        transport: ClientTransport,
    ) -> Result<TerminalSession, RelayError> {
        let target = match self.prepare(container_id).await {
            Ok(t) => t,
            Err(e) => {
                let writer = SessionWriter::new(transport.outgoing);
                let _ = writer.error(&e).await;
                writer.close().await;
                return Err(e);
            }
        };
        self.attach(target, initial_command, transport).await
    }

    /// Run `command` (default shell when `None`) without a TTY and return
    /// its combined output.
    pub async fn exec_once(
        &self,
        container_id: &str,
        command: Option<&str>,
    ) -> Result<ExecOutput, RelayError> {
        let target = self.prepare(container_id).await?;
        let command = command
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(&self.config.default_command)
            .to_string();
        let exec_id = self
            .engine
            .exec_create(&target.container_id, split_command(&command), false)
            .await?;
        let output = self.engine.exec_collect(&exec_id).await?;
        debug!(container_id = %target.container_id, %command, bytes = output.len(), "Exec finished");
        Ok(ExecOutput {
            container_id: target.container_id,
            command,
            output,
        })
    }

    /// Wait briefly for a leading `command` frame. Any other first frame is
    /// stashed in `pending` and the default command is used.
    async fn await_command(
        &self,
        incoming: &mut FrameStream,
        pending: &mut Vec<Frame>,
    ) -> Result<String, RelayError> {
        let default = || self.config.default_command.clone();
        match tokio::time::timeout(self.config.command_wait(), incoming.next()).await {
            Err(_) => Ok(default()),
            Ok(None | Some(Err(_) | Ok(Frame::Close))) => Err(RelayError::Disconnected),
            Ok(Some(Ok(Frame::Text(text)))) => match ControlMessage::decode(&text) {
                Ok(ControlMessage::Command(cmd)) => Ok(cmd),
                _ => {
                    pending.push(Frame::Text(text));
                    Ok(default())
                }
            },
            Ok(Some(Ok(frame))) => {
                pending.push(frame);
                Ok(default())
            }
        }
    }
}

/// Split a command line on whitespace.
pub fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

/// An attached terminal; call [`run`](Self::run) to pump it.
pub struct TerminalSession {
    session_id: String,
    container_id: String,
    exec_id: String,
    engine: Arc<dyn ContainerEngine>,
    chunk_size: usize,
    output: ByteStream,
    input: EngineInput,
    incoming: FrameStream,
    writer: SessionWriter,
    completion: Completion,
}

impl TerminalSession {
    pub fn completion(&self) -> Completion {
        self.completion.clone()
    }

    /// Relay until either side ends, then release both ends exactly once.
    pub async fn run(self) -> Option<CompletionReason> {
        let Self {
            session_id,
            container_id,
            exec_id,
            engine,
            chunk_size,
            output,
            input,
            incoming,
            writer,
            completion,
        } = self;

        let output_task = tokio::spawn(pump_output(
            output,
            chunk_size,
            writer.clone(),
            completion.clone(),
        ));
        let input_task = tokio::spawn(pump_input(
            incoming,
            input,
            engine,
            exec_id,
            writer.clone(),
            completion.clone(),
        ));

        let (out_res, in_res) = tokio::join!(output_task, input_task);
        if let Err(e) = out_res {
            warn!(session_id, error = %e, "Output task panicked");
            completion.complete(CompletionReason::EngineError);
        }
        match in_res {
            Ok(mut input) => {
                if let Err(e) = input.shutdown().await {
                    debug!(session_id, error = %e, "Exec stdin shutdown failed");
                }
            }
            Err(e) => {
                warn!(session_id, error = %e, "Input task panicked");
                completion.complete(CompletionReason::TransportError);
            }
        }
        writer.close().await;

        let reason = completion.reason();
        info!(session_id, container_id, ?reason, "Terminal session ended");
        reason
    }
}

async fn pump_output(
    output: ByteStream,
    chunk_size: usize,
    writer: SessionWriter,
    completion: Completion,
) {
    let mut reader = StreamReader::new(output.map_err(std::io::Error::other));
    let mut buf = vec![0u8; chunk_size];
    loop {
        let read = tokio::select! {
            () = completion.cancelled() => return,
            r = reader.read(&mut buf) => r,
        };
        match read {
            Ok(0) => {
                completion.complete(CompletionReason::EngineClosed);
                return;
            }
            Ok(n) => {
                let chunk = Bytes::copy_from_slice(&buf[..n]);
                let sent = tokio::select! {
                    () = completion.cancelled() => return,
                    r = writer.binary(chunk) => r,
                };
                if sent.is_err() {
                    completion.complete(CompletionReason::TransportError);
                    return;
                }
            }
            Err(e) => {
                if completion.complete(CompletionReason::EngineError) {
                    let _ = writer.error(format!("engine stream failed: {e}")).await;
                }
                return;
            }
        }
    }
}

/// Returns the exec stdin so the caller can shut it down after the join.
async fn pump_input(
    mut incoming: FrameStream,
    mut input: EngineInput,
    engine: Arc<dyn ContainerEngine>,
    exec_id: String,
    writer: SessionWriter,
    completion: Completion,
) -> EngineInput {
    loop {
        let frame = tokio::select! {
            () = completion.cancelled() => return input,
            f = incoming.next() => f,
        };
        let message = match frame {
            Some(Ok(Frame::Text(text))) => match ControlMessage::decode(&text) {
                Ok(msg) => msg,
                Err(e) => {
                    debug!(exec_id, error = %e, "Rejected control frame");
                    if writer.error(&e).await.is_err() {
                        completion.complete(CompletionReason::TransportError);
                        return input;
                    }
                    continue;
                }
            },
            Some(Ok(Frame::Binary(data))) => ControlMessage::Input(data),
            Some(Ok(Frame::Close)) | None => {
                completion.complete(CompletionReason::ClientClosed);
                return input;
            }
            Some(Err(e)) => {
                debug!(exec_id, error = %e, "Client read failed");
                completion.complete(CompletionReason::TransportError);
                return input;
            }
        };

        match message {
            ControlMessage::Input(data) => {
                let written = async {
                    input.write_all(&data).await?;
                    input.flush().await
                };
                let result = tokio::select! {
                    () = completion.cancelled() => return input,
                    r = written => r,
                };
                if let Err(e) = result {
                    if completion.complete(CompletionReason::EngineError) {
                        let _ = writer.error(format!("write to exec failed: {e}")).await;
                    }
                    return input;
                }
            }
            ControlMessage::Resize(size) => {
                let resized = tokio::select! {
                    () = completion.cancelled() => return input,
                    r = engine.exec_resize(&exec_id, size.rows, size.cols) => r,
                };
                if let Err(e) = resized {
                    warn!(exec_id, rows = size.rows, cols = size.cols, error = %e, "Resize failed");
                    if writer.error(format!("resize failed: {e}")).await.is_err() {
                        completion.complete(CompletionReason::TransportError);
                        return input;
                    }
                }
            }
            ControlMessage::Command(_) => {
                if writer
                    .error(RelayError::Protocol("command already running".into()))
                    .await
                    .is_err()
                {
                    completion.complete(CompletionReason::TransportError);
                    return input;
                }
            }
        }
    }
}
