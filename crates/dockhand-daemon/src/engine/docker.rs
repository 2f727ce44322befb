//! Docker Engine API implementation of [`ContainerEngine`] via bollard.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{ListContainersOptions, LogsOptions};
use bollard::errors::Error as BollardError;
use bollard::exec::{CreateExecOptions, ResizeExecOptions, StartExecOptions, StartExecResults};
use futures::{StreamExt, TryStreamExt};
use tracing::debug;

use super::{
    ContainerEngine, ContainerInfo, ContainerSummary, EngineError, EngineLogStream,
    ExecAttachment, LogFraming, LogOptions,
};

/// Engine backed by a Docker (or API-compatible) daemon.
#[derive(Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect to `host`, or to the platform default when `None`.
    ///
    /// Connecting is lazy in bollard: this only validates the address. Use
    /// [`ContainerEngine::ping`] to check reachability.
    pub fn connect(host: Option<&str>, timeout_secs: u64) -> Result<Self, EngineError> {
        let docker = match host {
            None => Docker::connect_with_local_defaults(),
            Some(h) if h.starts_with("unix://") => {
                Docker::connect_with_socket(h, timeout_secs, bollard::API_DEFAULT_VERSION)
            }
            Some(h) => {
                let addr = h.replacen("tcp://", "http://", 1);
                Docker::connect_with_http(&addr, timeout_secs, bollard::API_DEFAULT_VERSION)
            }
        }
        .map_err(|e| EngineError::Unavailable(e.to_string()))?;
        Ok(Self { docker })
    }
}

fn map_err(err: BollardError) -> EngineError {
    match err {
        BollardError::DockerResponseServerError {
            status_code: 404,
            message,
        } => EngineError::NotFound(message),
        BollardError::DockerResponseServerError {
            status_code,
            message,
        } => EngineError::Api {
            status: status_code,
            message,
        },
        BollardError::IOError { err } => EngineError::Unavailable(err.to_string()),
        BollardError::HyperResponseError { err } => EngineError::Unavailable(err.to_string()),
        other => EngineError::Stream(other.to_string()),
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn inspect(&self, container_id: &str) -> Result<ContainerInfo, EngineError> {
        let resp = self
            .docker
            .inspect_container(container_id, None)
            .await
            .map_err(map_err)?;
        let config = resp.config.unwrap_or_default();
        Ok(ContainerInfo {
            id: resp.id.unwrap_or_else(|| container_id.to_string()),
            name: resp
                .name
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_default(),
            running: resp.state.and_then(|s| s.running).unwrap_or(false),
            labels: config.labels.unwrap_or_default(),
        })
    }

    async fn exec_create(
        &self,
        container_id: &str,
        cmd: Vec<String>,
        tty: bool,
    ) -> Result<String, EngineError> {
        let options = CreateExecOptions::<String> {
            attach_stdin: Some(tty),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(tty),
            cmd: Some(cmd),
            ..Default::default()
        };
        let created = self
            .docker
            .create_exec(container_id, options)
            .await
            .map_err(map_err)?;
        debug!(container_id, exec_id = %created.id, "Exec instance created");
        Ok(created.id)
    }

    async fn exec_attach(&self, exec_id: &str) -> Result<ExecAttachment, EngineError> {
        let options = StartExecOptions {
            detach: false,
            tty: true,
            ..Default::default()
        };
        match self
            .docker
            .start_exec(exec_id, Some(options))
            .await
            .map_err(map_err)?
        {
            StartExecResults::Attached { output, input } => Ok(ExecAttachment {
                output: output
                    .map_ok(bollard::container::LogOutput::into_bytes)
                    .map_err(map_err)
                    .boxed(),
                input,
            }),
            StartExecResults::Detached => Err(EngineError::Stream(format!(
                "exec {exec_id} started detached"
            ))),
        }
    }

    async fn exec_resize(&self, exec_id: &str, rows: u16, cols: u16) -> Result<(), EngineError> {
        self.docker
            .resize_exec(
                exec_id,
                ResizeExecOptions {
                    height: rows,
                    width: cols,
                },
            )
            .await
            .map_err(map_err)
    }

    async fn exec_collect(&self, exec_id: &str) -> Result<String, EngineError> {
        let StartExecResults::Attached { mut output, .. } = self
            .docker
            .start_exec(exec_id, None)
            .await
            .map_err(map_err)?
        else {
            return Err(EngineError::Stream(format!(
                "exec {exec_id} started detached"
            )));
        };
        let mut collected = String::new();
        while let Some(chunk) = output.next().await {
            collected.push_str(&chunk.map_err(map_err)?.to_string());
        }
        Ok(collected)
    }

    async fn logs(
        &self,
        container_id: &str,
        options: LogOptions,
    ) -> Result<EngineLogStream, EngineError> {
        // Fail fast on unknown containers; the log stream itself only
        // reports 404 on first poll.
        self.docker
            .inspect_container(container_id, None)
            .await
            .map_err(map_err)?;
        let opts = LogsOptions::<String> {
            follow: options.follow,
            stdout: options.stdout,
            stderr: options.stderr,
            tail: options
                .tail
                .map_or_else(|| "all".to_string(), |n| n.to_string()),
            ..Default::default()
        };
        // bollard demultiplexes the 8-byte stream headers itself.
        let bytes = self
            .docker
            .logs(container_id, Some(opts))
            .map_ok(bollard::container::LogOutput::into_bytes)
            .map_err(map_err)
            .boxed();
        Ok(EngineLogStream {
            framing: LogFraming::Raw,
            bytes,
        })
    }

    async fn list_containers(
        &self,
        label: &str,
        all: bool,
    ) -> Result<Vec<ContainerSummary>, EngineError> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![label.to_string()]);
        let rows = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all,
                filters,
                ..Default::default()
            }))
            .await
            .map_err(map_err)?;
        Ok(rows
            .into_iter()
            .map(|row| ContainerSummary {
                id: row.id.unwrap_or_default(),
                name: row
                    .names
                    .and_then(|names| names.into_iter().next())
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_default(),
                state: row.state.map(|s| s.to_string()).unwrap_or_default(),
                labels: row.labels.unwrap_or_default(),
            })
            .collect())
    }

    async fn ping(&self) -> Result<(), EngineError> {
        self.docker.ping().await.map(|_| ()).map_err(map_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_from_404() {
        let err = map_err(BollardError::DockerResponseServerError {
            status_code: 404,
            message: "No such container: nope".into(),
        });
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn other_status_maps_to_api() {
        let err = map_err(BollardError::DockerResponseServerError {
            status_code: 409,
            message: "container is not running".into(),
        });
        assert!(matches!(err, EngineError::Api { status: 409, .. }));
    }
}
