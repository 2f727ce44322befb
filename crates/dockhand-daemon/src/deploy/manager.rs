//! Project lifecycle: deploy, status, start/stop, removal.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use dockhand_core::config::DeployConfig;

use super::pipeline::{DeployStream, PipelineContext, spawn_pipeline};
use super::project::ProjectStore;
use super::runner::CommandRunner;
use crate::engine::ContainerEngine;
use crate::error::RelayError;

/// Container counts for one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectStatus {
    pub name: String,
    pub total: usize,
    pub running: usize,
    pub deployed: bool,
    pub healthy: bool,
}

impl ProjectStatus {
    pub fn new(name: impl Into<String>, total: usize, running: usize) -> Self {
        Self {
            name: name.into(),
            total,
            running,
            deployed: total > 0,
            healthy: total > 0 && running == total,
        }
    }
}

/// Manages deployed projects.
pub struct ProjectManager {
    store: ProjectStore,
    runner: CommandRunner,
    engine: Arc<dyn ContainerEngine>,
    config: DeployConfig,
}

impl ProjectManager {
    pub fn new(engine: Arc<dyn ContainerEngine>, config: DeployConfig) -> Self {
        let store = ProjectStore::new(&config.projects_root, &config.spec_file_name);
        info!(root = %store.root().display(), "Projects root");
        Self {
            store,
            runner: CommandRunner::new(&config.program),
            engine,
            config,
        }
    }

    /// Store the specification and start the deployment.
    ///
    /// Name, conflict and specification checks fail here, before any event
    /// is produced. Everything after that is reported on the stream.
    pub async fn deploy(&self, name: &str, content: &str) -> Result<DeployStream, RelayError> {
        let project = self.store.create(name, content).await?;
        Ok(spawn_pipeline(PipelineContext {
            project,
            runner: self.runner.clone(),
            up_args: self.config.up_args.clone(),
            engine: Arc::clone(&self.engine),
            project_label: self.config.project_label.clone(),
            channel_capacity: self.config.channel_capacity,
            idle_timeout: self.config.idle_timeout(),
        }))
    }

    pub async fn status(&self, name: &str) -> Result<ProjectStatus, RelayError> {
        let project = self.store.open(name).await?;
        let containers = self
            .engine
            .list_containers(
                &format!("{}={}", self.config.project_label, project.name),
                true,
            )
            .await?;
        let running = containers.iter().filter(|c| c.is_running()).count();
        Ok(ProjectStatus::new(project.name, containers.len(), running))
    }

    pub async fn start(&self, name: &str) -> Result<String, RelayError> {
        let project = self.store.open(name).await?;
        let output = self.runner.run(&self.config.start_args, &project).await?;
        info!(project = name, "Project started");
        Ok(output)
    }

    pub async fn stop(&self, name: &str) -> Result<String, RelayError> {
        let project = self.store.open(name).await?;
        let output = self.runner.run(&self.config.stop_args, &project).await?;
        info!(project = name, "Project stopped");
        Ok(output)
    }

    /// Tear the project down, then delete its directory.
    pub async fn remove(&self, name: &str) -> Result<String, RelayError> {
        let project = self.store.open(name).await?;
        let output = self.runner.run(&self.config.down_args, &project).await?;
        self.store.remove_dir(&project).await?;
        info!(project = name, "Project removed");
        Ok(output)
    }

    pub async fn specification(&self, name: &str) -> Result<String, RelayError> {
        self.store.read_specification(name).await
    }

    pub async fn list(&self) -> Result<Vec<String>, RelayError> {
        self.store.list().await
    }
}
