//! Project deployment: on-disk store, command runner and event pipeline.

mod manager;
mod pipeline;
mod project;
mod runner;

pub use manager::{ProjectManager, ProjectStatus};
pub use pipeline::DeployStream;
pub use project::{Project, ProjectStore, validate_name, validate_specification};
pub use runner::{CommandRunner, RunnerError};
