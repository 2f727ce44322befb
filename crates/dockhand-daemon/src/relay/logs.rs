//! Multi-container log aggregation.
//!
//! ```text
//! container A logs ─┐
//! container B logs ─┼─> reader task per container ─> bounded channel ─> LogSession
//! container C logs ─┘
//! ```
//!
//! A supervisor task completes the session either when every reader has
//! finished or when the consumer drops its [`LogSession`]. Readers check the
//! completion before each send and race the send against it, but an engine
//! read that never returns is not interrupted: that reader lingers until the
//! engine yields again.

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt, TryStreamExt};
use tokio::io::AsyncBufRead;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;
use tracing::{debug, info, warn};

use dockhand_core::config::LogsConfig;
use dockhand_core::protocol::{LogLine, StdFrameDecoder};

use super::completion::{Completion, CompletionReason};
use super::lines::{MAX_LINE_LEN, decode_line, read_line};
use crate::engine::{ContainerEngine, EngineLogStream, LogFraming, LogOptions};
use crate::error::RelayError;

/// Starts log sessions.
pub struct LogAggregator {
    engine: Arc<dyn ContainerEngine>,
    config: LogsConfig,
}

impl LogAggregator {
    pub fn new(engine: Arc<dyn ContainerEngine>, config: LogsConfig) -> Self {
        Self { engine, config }
    }

    /// Follow the logs of every container in `container_ids`.
    ///
    /// All containers are inspected before any stream is opened, so an
    /// unknown id fails the whole call with [`RelayError::NotFound`].
    pub async fn stream_logs<I, S>(&self, container_ids: I) -> Result<LogSession, RelayError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let ids: Vec<String> = container_ids
            .into_iter()
            .map(Into::into)
            .map(|s: String| s.trim().to_string())
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect();
        if ids.is_empty() {
            return Err(RelayError::InvalidInput("no containers requested".into()));
        }

        let mut sources = Vec::with_capacity(ids.len());
        for id in &ids {
            let info = self.engine.inspect(id).await?;
            let name = info.name.trim_start_matches('/');
            let source = if name.is_empty() { id.clone() } else { name.to_string() };
            sources.push((id.clone(), source));
        }

        let options = LogOptions::follow_tail(self.config.tail);
        let mut streams = Vec::with_capacity(sources.len());
        for (id, source) in sources {
            let stream = self.engine.logs(&id, options).await?;
            streams.push((id, source, stream));
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        let prefixed = streams.len() > 1;
        let completion = Completion::new();
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));

        let readers: Vec<_> = streams
            .into_iter()
            .map(|(id, source, stream)| {
                tokio::spawn(read_container(
                    id,
                    source,
                    stream,
                    tx.clone(),
                    completion.clone(),
                ))
            })
            .collect();
        info!(session_id, containers = ?ids, "Log session started");
        tokio::spawn(supervise(session_id.clone(), readers, tx, completion.clone()));

        Ok(LogSession {
            session_id,
            rx: ReceiverStream::new(rx),
            completion,
            prefixed,
        })
    }
}

/// Completes the session when all readers are done or the consumer is gone.
///
/// Holds the last sender only as a probe: once it is dropped the channel
/// closes as soon as the readers' clones are gone too.
async fn supervise(
    session_id: String,
    readers: Vec<tokio::task::JoinHandle<()>>,
    probe: mpsc::Sender<LogLine>,
    completion: Completion,
) {
    tokio::select! {
        () = probe.closed() => {
            completion.complete(CompletionReason::ConsumerDropped);
        }
        results = futures::future::join_all(readers) => {
            for r in results {
                if let Err(e) = r {
                    warn!(session_id, error = %e, "Log reader panicked");
                }
            }
            completion.complete(CompletionReason::Finished);
        }
    }
    drop(probe);
    debug!(session_id, reason = ?completion.reason(), "Log session supervisor finished");
}

async fn read_container(
    container_id: String,
    source: String,
    stream: EngineLogStream,
    tx: mpsc::Sender<LogLine>,
    completion: Completion,
) {
    let EngineLogStream { framing, bytes } = stream;
    let bytes = bytes.map_err(std::io::Error::other);
    let result = match framing {
        LogFraming::Raw => forward_lines(StreamReader::new(bytes), &source, &tx, &completion).await,
        LogFraming::Multiplexed => {
            let payloads = FramedRead::new(StreamReader::new(bytes), StdFrameDecoder::default())
                .map_ok(|frame| frame.payload);
            forward_lines(StreamReader::new(payloads), &source, &tx, &completion).await
        }
    };
    match result {
        Ok(()) => debug!(container_id, "Log stream ended"),
        Err(e) => warn!(container_id, error = %e, "Log stream failed"),
    }
}

async fn forward_lines<R>(
    mut reader: R,
    source: &str,
    tx: &mpsc::Sender<LogLine>,
    completion: &Completion,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        if completion.is_complete() {
            return Ok(());
        }
        buf.clear();
        if read_line(&mut reader, &mut buf, MAX_LINE_LEN).await? == 0 {
            return Ok(());
        }
        let line = LogLine::new(source, decode_line(&buf));
        if !completion.send_guarded(tx, line).await {
            return Ok(());
        }
    }
}

/// Consumer side of a log session. Dropping it ends the session.
pub struct LogSession {
    session_id: String,
    rx: ReceiverStream<LogLine>,
    completion: Completion,
    prefixed: bool,
}

impl LogSession {
    /// Whether lines should be rendered with a `[source]` prefix.
    pub const fn prefixed(&self) -> bool {
        self.prefixed
    }

    pub fn completion(&self) -> Completion {
        self.completion.clone()
    }
}

impl Stream for LogSession {
    type Item = LogLine;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_next_unpin(cx)
    }
}

impl Drop for LogSession {
    fn drop(&mut self) {
        if self.completion.complete(CompletionReason::ConsumerDropped) {
            debug!(session_id = %self.session_id, "Log consumer dropped");
        }
    }
}
