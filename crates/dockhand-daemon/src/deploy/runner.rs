//! External command invocation for deployment tooling.
//!
//! Commands are described by argument templates from the deploy config.
//! The placeholders `{project}`, `{file}` and `{dir}` are substituted per
//! project before the program is started in the project directory.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, Command};
use tracing::{debug, info};

use super::project::Project;

/// Errors from running deployment commands.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Failed to spawn {program}: {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("{program} exited with {status}: {output}")]
    Failed {
        program: String,
        status: ExitStatus,
        output: String,
    },
}

/// Starts the configured deployment program.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: PathBuf,
}

impl CommandRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Substitute the project placeholders in `template`.
    pub fn render_args(template: &[String], project: &Project) -> Vec<String> {
        let file = project.spec_path.to_string_lossy();
        let dir = project.dir.to_string_lossy();
        template
            .iter()
            .map(|arg| {
                arg.replace("{project}", &project.name)
                    .replace("{file}", &file)
                    .replace("{dir}", &dir)
            })
            .collect()
    }

    /// Spawn with stdout and stderr piped; stdin is closed.
    pub fn spawn(&self, template: &[String], project: &Project) -> Result<Child, RunnerError> {
        let args = Self::render_args(template, project);
        info!(
            project = %project.name,
            program = %self.program.display(),
            ?args,
            "Spawning deployment command"
        );
        Command::new(&self.program)
            .args(&args)
            .current_dir(&project.dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false)
            .spawn()
            .map_err(|e| RunnerError::SpawnFailed {
                program: self.program.display().to_string(),
                reason: e.to_string(),
            })
    }

    /// Run to completion and return stdout followed by stderr.
    ///
    /// A non-zero exit is [`RunnerError::Failed`] carrying the captured output.
    pub async fn run(&self, template: &[String], project: &Project) -> Result<String, RunnerError> {
        let child = self.spawn(template, project)?;
        let out = child
            .wait_with_output()
            .await
            .map_err(|e| RunnerError::SpawnFailed {
                program: self.program.display().to_string(),
                reason: e.to_string(),
            })?;
        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));
        debug!(project = %project.name, status = %out.status, "Deployment command finished");
        if out.status.success() {
            Ok(output)
        } else {
            Err(RunnerError::Failed {
                program: self.program.display().to_string(),
                status: out.status,
                output: output.trim().to_string(),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::path::Path;

    fn project() -> Project {
        Project::at(Path::new("/srv/deployments"), "demo", "docker-compose.yaml")
    }

    #[test]
    fn placeholders_are_substituted() {
        let template: Vec<String> = ["compose", "-p", "{project}", "-f", "{file}", "--project-directory={dir}"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let args = CommandRunner::render_args(&template, &project());
        assert_eq!(
            args,
            vec![
                "compose",
                "-p",
                "demo",
                "-f",
                "/srv/deployments/demo/docker-compose.yaml",
                "--project-directory=/srv/deployments/demo",
            ]
        );
    }

    #[tokio::test]
    async fn missing_program_is_spawn_failure() {
        let runner = CommandRunner::new("/nonexistent/dockhand-test-binary");
        let dir = tempfile::tempdir().unwrap();
        let project = Project::at(dir.path(), "demo", "docker-compose.yaml");
        std::fs::create_dir_all(&project.dir).unwrap();
        match runner.run(&[], &project).await {
            Err(RunnerError::SpawnFailed { .. }) => {}
            other => panic!("expected spawn failure, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_carries_output() {
        let runner = CommandRunner::new("sh");
        let dir = tempfile::tempdir().unwrap();
        let project = Project::at(dir.path(), "demo", "docker-compose.yaml");
        std::fs::create_dir_all(&project.dir).unwrap();
        let template = vec!["-c".to_string(), "echo nope {project} >&2; exit 3".to_string()];
        match runner.run(&template, &project).await {
            Err(RunnerError::Failed { output, status, .. }) => {
                assert_eq!(output, "nope demo");
                assert_eq!(status.code(), Some(3));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
