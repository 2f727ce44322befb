//! Shared test fixtures: an in-memory container engine and client transport.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt, TryStreamExt, stream};
use tokio_util::io::ReaderStream;

use dockhand_core::protocol::Frame;
use dockhand_daemon::engine::{
    ContainerEngine, ContainerInfo, ContainerSummary, EngineError, EngineLogStream,
    ExecAttachment, LogFraming, LogOptions,
};
use dockhand_daemon::relay::{ClientTransport, TransportError};

/// Build one multiplexed log frame.
pub fn std_frame(stream: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![stream, 0, 0, 0];
    out.extend_from_slice(&u32::try_from(payload.len()).unwrap().to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Scripted log output of one container.
#[derive(Clone)]
pub struct LogScript {
    pub framing: LogFraming,
    pub chunks: Vec<Bytes>,
    /// Keep the stream open after the chunks, like `follow` on a live container.
    pub hold_open: bool,
}

#[derive(Clone)]
pub struct FakeContainer {
    pub id: String,
    pub name: String,
    pub running: bool,
    pub labels: HashMap<String, String>,
    pub logs: Option<LogScript>,
    /// When set, execs print these chunks and exit instead of echoing stdin.
    pub exec_output: Option<Vec<Bytes>>,
}

impl FakeContainer {
    pub fn running(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            running: true,
            labels: HashMap::new(),
            logs: None,
            exec_output: None,
        }
    }

    pub fn stopped(id: &str, name: &str) -> Self {
        Self {
            running: false,
            ..Self::running(id, name)
        }
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_logs(mut self, script: LogScript) -> Self {
        self.logs = Some(script);
        self
    }

    pub fn with_exec_output(mut self, chunks: &[&str]) -> Self {
        self.exec_output = Some(chunks.iter().map(|c| Bytes::from(c.to_string())).collect());
        self
    }
}

/// In-memory engine. Execs echo their stdin back unless the container has
/// scripted exec output.
#[derive(Default)]
pub struct FakeEngine {
    containers: Mutex<HashMap<String, FakeContainer>>,
    execs: Mutex<HashMap<String, (String, Vec<String>)>>,
    pub resizes: Mutex<Vec<(u16, u16)>>,
    pub fail_resize: Mutex<bool>,
    /// Resize calls never return; `resize_started` fires when one begins.
    pub stall_resize: Mutex<bool>,
    pub resize_started: tokio::sync::Notify,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add(&self, container: FakeContainer) {
        let mut containers = self.containers.lock().unwrap();
        containers.insert(container.name.clone(), container.clone());
        containers.insert(container.id.clone(), container);
    }

    /// Commands of every exec created so far.
    pub fn exec_commands(&self) -> Vec<Vec<String>> {
        self.execs
            .lock()
            .unwrap()
            .values()
            .map(|(_, cmd)| cmd.clone())
            .collect()
    }

    fn find(&self, id: &str) -> Result<FakeContainer, EngineError> {
        self.containers
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("No such container: {id}")))
    }

    fn exec(&self, exec_id: &str) -> Result<(String, Vec<String>), EngineError> {
        self.execs
            .lock()
            .unwrap()
            .get(exec_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("No such exec instance: {exec_id}")))
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn inspect(&self, container_id: &str) -> Result<ContainerInfo, EngineError> {
        let c = self.find(container_id)?;
        Ok(ContainerInfo {
            id: c.id,
            name: c.name,
            running: c.running,
            labels: c.labels,
        })
    }

    async fn exec_create(
        &self,
        container_id: &str,
        cmd: Vec<String>,
        _tty: bool,
    ) -> Result<String, EngineError> {
        let c = self.find(container_id)?;
        let mut execs = self.execs.lock().unwrap();
        let exec_id = format!("exec-{}", execs.len() + 1);
        execs.insert(exec_id.clone(), (c.id, cmd));
        Ok(exec_id)
    }

    async fn exec_attach(&self, exec_id: &str) -> Result<ExecAttachment, EngineError> {
        let (container_id, _) = self.exec(exec_id)?;
        let container = self.find(&container_id)?;

        if let Some(chunks) = container.exec_output {
            return Ok(ExecAttachment {
                output: stream::iter(chunks.into_iter().map(Ok)).boxed(),
                input: Box::pin(tokio::io::sink()),
            });
        }

        let (client, process) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let (mut stdin, mut stdout) = tokio::io::split(process);
            let _ = tokio::io::copy(&mut stdin, &mut stdout).await;
        });
        let (reader, writer) = tokio::io::split(client);
        Ok(ExecAttachment {
            output: ReaderStream::new(reader)
                .map_err(|e| EngineError::Stream(e.to_string()))
                .boxed(),
            input: Box::pin(writer),
        })
    }

    async fn exec_resize(&self, exec_id: &str, rows: u16, cols: u16) -> Result<(), EngineError> {
        self.exec(exec_id)?;
        let stall = *self.stall_resize.lock().unwrap();
        if stall {
            self.resize_started.notify_one();
            std::future::pending::<()>().await;
        }
        if *self.fail_resize.lock().unwrap() {
            return Err(EngineError::Api {
                status: 500,
                message: "resize rejected".into(),
            });
        }
        self.resizes.lock().unwrap().push((rows, cols));
        Ok(())
    }

    async fn exec_collect(&self, exec_id: &str) -> Result<String, EngineError> {
        let (_, cmd) = self.exec(exec_id)?;
        Ok(format!("ran {}\n", cmd.join(" ")))
    }

    async fn logs(
        &self,
        container_id: &str,
        _options: LogOptions,
    ) -> Result<EngineLogStream, EngineError> {
        let c = self.find(container_id)?;
        let script = c.logs.unwrap_or(LogScript {
            framing: LogFraming::Raw,
            chunks: Vec::new(),
            hold_open: false,
        });
        let chunks = stream::iter(script.chunks.into_iter().map(Ok));
        let bytes = if script.hold_open {
            chunks.chain(stream::pending()).boxed()
        } else {
            chunks.boxed()
        };
        Ok(EngineLogStream {
            framing: script.framing,
            bytes,
        })
    }

    async fn list_containers(
        &self,
        label: &str,
        _all: bool,
    ) -> Result<Vec<ContainerSummary>, EngineError> {
        let (key, value) = label.split_once('=').unwrap_or((label, ""));
        let containers = self.containers.lock().unwrap();
        let mut seen = std::collections::HashSet::new();
        Ok(containers
            .values()
            .filter(|c| c.labels.get(key).is_some_and(|v| v == value))
            .filter(|c| seen.insert(c.id.clone()))
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                name: c.name.clone(),
                state: if c.running { "running" } else { "exited" }.to_string(),
                labels: c.labels.clone(),
            })
            .collect())
    }

    async fn ping(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Test side of an in-memory client connection.
pub struct TestClient {
    pub tx: mpsc::UnboundedSender<Result<Frame, TransportError>>,
    pub rx: mpsc::UnboundedReceiver<Frame>,
}

impl TestClient {
    pub fn send_text(&self, text: &str) {
        self.tx.unbounded_send(Ok(Frame::Text(text.to_string()))).unwrap();
    }

    pub fn send_close(&self) {
        self.tx.unbounded_send(Ok(Frame::Close)).unwrap();
    }

    /// Next frame from the server, failing the test after two seconds.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        tokio::time::timeout(Duration::from_secs(2), self.rx.next())
            .await
            .expect("timed out waiting for a server frame")
    }

    /// Read binary frames until their concatenation contains `needle`.
    pub async fn read_output_until(&mut self, needle: &str) -> String {
        let mut seen = String::new();
        while !seen.contains(needle) {
            match self.next_frame().await {
                Some(Frame::Binary(data)) => seen.push_str(&String::from_utf8_lossy(&data)),
                Some(_) => {}
                None => break,
            }
        }
        seen
    }
}

pub fn memory_transport() -> (ClientTransport, TestClient) {
    let (client_tx, server_rx) = mpsc::unbounded::<Result<Frame, TransportError>>();
    let (server_tx, client_rx) = mpsc::unbounded::<Frame>();
    let outgoing = server_tx.sink_map_err(|_| TransportError::Closed);
    let transport = ClientTransport::new(server_rx.boxed(), Box::pin(outgoing));
    (
        transport,
        TestClient {
            tx: client_tx,
            rx: client_rx,
        },
    )
}
