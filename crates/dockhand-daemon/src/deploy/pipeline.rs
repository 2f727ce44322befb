//! Deployment event pipeline.
//!
//! Data flow:
//! ```text
//! deploy command stdout ─┐
//!                        ├─> line channel ─> classify ─> event channel ─> DeployStream
//! deploy command stderr ─┘
//!            exit status ─> verify via engine label query ─> final event
//! ```
//!
//! The consumer side enforces an inactivity timeout. When it fires, or the
//! consumer goes away, the pipeline stops emitting; the deployment command
//! itself is left to finish on its own.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::io::{AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::time::{Instant, Sleep};
use tracing::{debug, info, warn};

use dockhand_core::classify::classify_event;
use dockhand_core::protocol::DeployEvent;

use super::project::Project;
use super::runner::CommandRunner;
use crate::engine::ContainerEngine;
use crate::relay::{Completion, CompletionReason, MAX_LINE_LEN, decode_line, read_line};

/// Everything the pipeline task needs.
pub(crate) struct PipelineContext {
    pub project: Project,
    pub runner: CommandRunner,
    pub up_args: Vec<String>,
    pub engine: Arc<dyn ContainerEngine>,
    /// Label key identifying a project's containers.
    pub project_label: String,
    pub channel_capacity: usize,
    pub idle_timeout: Duration,
}

/// Start the pipeline task and return the consumer stream.
pub(crate) fn spawn_pipeline(ctx: PipelineContext) -> DeployStream {
    let completion = Completion::new();
    let (tx, rx) = mpsc::channel(ctx.channel_capacity.max(1));
    let project = ctx.project.name.clone();
    let idle = ctx.idle_timeout;
    tokio::spawn(run_pipeline(ctx, tx, completion.clone()));
    DeployStream {
        project,
        rx,
        idle,
        deadline: Box::pin(tokio::time::sleep(idle)),
        completion,
        done: false,
    }
}

async fn run_pipeline(ctx: PipelineContext, tx: mpsc::Sender<DeployEvent>, completion: Completion) {
    let PipelineContext {
        project,
        runner,
        up_args,
        engine,
        project_label,
        channel_capacity,
        ..
    } = ctx;
    let name = project.name.clone();

    if !completion
        .send_guarded(&tx, DeployEvent::info(format!("deploying {name}")))
        .await
    {
        return;
    }

    let mut child = match runner.spawn(&up_args, &project) {
        Ok(child) => child,
        Err(e) => {
            warn!(project = %name, error = %e, "Deployment command did not start");
            completion.send_guarded(&tx, DeployEvent::error(e.to_string())).await;
            completion.complete(CompletionReason::Finished);
            return;
        }
    };

    let (line_tx, mut line_rx) = mpsc::channel::<String>(channel_capacity.max(1));
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(scan_lines(stdout, line_tx.clone(), completion.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(scan_lines(stderr, line_tx.clone(), completion.clone()));
    }
    drop(line_tx);

    loop {
        let line = tokio::select! {
            () = completion.cancelled() => {
                warn!(project = %name, reason = ?completion.reason(), "Deploy stream ended before the command finished; leaving it running");
                return;
            }
            line = line_rx.recv() => line,
        };
        let Some(line) = line else { break };
        debug!(project = %name, %line, "deploy output");
        if !completion.send_guarded(&tx, classify_event(line)).await {
            warn!(project = %name, "Deploy stream consumer gone; leaving command running");
            return;
        }
    }

    let status = tokio::select! {
        () = completion.cancelled() => return,
        status = child.wait() => status,
    };
    let final_event = match status {
        Err(e) => DeployEvent::error(format!("failed to wait for deployment command: {e}")),
        Ok(status) if !status.success() => {
            DeployEvent::error(format!("deployment command failed: {status}"))
        }
        Ok(_) => {
            if !completion
                .send_guarded(&tx, DeployEvent::info("verifying deployment"))
                .await
            {
                return;
            }
            verify(engine.as_ref(), &project_label, &name).await
        }
    };
    info!(project = %name, kind = ?final_event.kind, message = %final_event.message, "Deployment finished");
    completion.send_guarded(&tx, final_event).await;
    completion.complete(CompletionReason::Finished);
}

/// Compare the project's containers against the running ones.
async fn verify(engine: &dyn ContainerEngine, label_key: &str, name: &str) -> DeployEvent {
    match engine
        .list_containers(&format!("{label_key}={name}"), true)
        .await
    {
        Ok(containers) => {
            let total = containers.len();
            let running = containers.iter().filter(|c| c.is_running()).count();
            if total > 0 && running == total {
                DeployEvent::success(format!(
                    "deployment complete: all {total} containers running"
                ))
            } else {
                DeployEvent::warning(format!(
                    "deployment finished but only {running} of {total} containers are running"
                ))
            }
        }
        Err(e) => DeployEvent::warning(format!("could not verify deployment: {e}")),
    }
}

/// Forward one output pipe line by line. Invalid UTF-8 is replaced, so the
/// pipe keeps draining whatever the command prints.
async fn scan_lines<R>(pipe: R, tx: mpsc::Sender<String>, completion: Completion)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match read_line(&mut reader, &mut buf, MAX_LINE_LEN).await {
            Ok(0) => return,
            Ok(_) => {
                if !completion.send_guarded(&tx, decode_line(&buf)).await {
                    return;
                }
            }
            Err(e) => {
                debug!(error = %e, "deploy output read failed");
                return;
            }
        }
    }
}

/// Consumer side of a deployment.
///
/// Yields events until the pipeline finishes. If no event arrives within the
/// idle timeout, yields one final `error` event and ends. Dropping the
/// stream stops the pipeline from emitting.
pub struct DeployStream {
    project: String,
    rx: mpsc::Receiver<DeployEvent>,
    idle: Duration,
    deadline: Pin<Box<Sleep>>,
    completion: Completion,
    done: bool,
}

impl DeployStream {
    pub fn completion(&self) -> Completion {
        self.completion.clone()
    }
}

impl Stream for DeployStream {
    type Item = DeployEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.done {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                let next = Instant::now() + this.idle;
                this.deadline.as_mut().reset(next);
                return Poll::Ready(Some(event));
            }
            Poll::Ready(None) => {
                this.done = true;
                this.completion.complete(CompletionReason::Finished);
                return Poll::Ready(None);
            }
            Poll::Pending => {}
        }
        match this.deadline.as_mut().poll(cx) {
            Poll::Ready(()) => {
                this.done = true;
                if this.completion.complete(CompletionReason::IdleTimeout) {
                    warn!(project = %this.project, idle_secs = this.idle.as_secs_f64(), "Deploy stream idle timeout");
                }
                Poll::Ready(Some(DeployEvent::error(format!(
                    "Timeout: no output for {} s",
                    this.idle.as_secs_f64()
                ))))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for DeployStream {
    fn drop(&mut self) {
        if self.completion.complete(CompletionReason::ConsumerDropped) {
            debug!(project = %self.project, "Deploy stream consumer dropped");
        }
    }
}
