//! On-disk project store.
//!
//! Each deployed project owns `<projects_root>/<name>/`, holding the
//! submitted specification. The directory's existence is what marks a
//! project as deployed.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::RelayError;

const MAX_NAME_LEN: usize = 64;

/// A project's location on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub name: String,
    pub dir: PathBuf,
    pub spec_path: PathBuf,
}

impl Project {
    /// Paths for `name` under `root`. Does not validate or touch the disk.
    pub fn at(root: &Path, name: &str, spec_file: &str) -> Self {
        let dir = root.join(name);
        Self {
            name: name.to_string(),
            spec_path: dir.join(spec_file),
            dir,
        }
    }
}

/// Validate a project name: `[A-Za-z0-9_-]{1,64}`, not starting with `-`.
pub fn validate_name(name: &str) -> Result<(), RelayError> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(RelayError::InvalidInput(format!(
            "project name must be 1-{MAX_NAME_LEN} characters"
        )));
    }
    if name.starts_with('-') {
        return Err(RelayError::InvalidInput(
            "project name must not start with '-'".into(),
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(RelayError::InvalidInput(format!(
            "invalid project name {name:?}: use letters, digits, '_' and '-'"
        )));
    }
    Ok(())
}

/// Check that `content` is YAML with a non-empty `services` mapping.
pub fn validate_specification(content: &str) -> Result<(), RelayError> {
    let doc: serde_yaml::Value = serde_yaml::from_str(content)
        .map_err(|e| RelayError::InvalidInput(format!("invalid YAML: {e}")))?;
    match doc.get("services") {
        Some(serde_yaml::Value::Mapping(services)) if !services.is_empty() => Ok(()),
        _ => Err(RelayError::InvalidInput(
            "specification must define at least one service under 'services'".into(),
        )),
    }
}

/// Project directories under one root.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    root: PathBuf,
    spec_file: String,
}

impl ProjectStore {
    /// A relative `root` is resolved against the current directory here,
    /// since deploy commands run with the project directory as their cwd.
    pub fn new(root: impl Into<PathBuf>, spec_file: impl Into<String>) -> Self {
        let root = root.into();
        Self {
            root: std::path::absolute(&root).unwrap_or(root),
            spec_file: spec_file.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn project(&self, name: &str) -> Result<Project, RelayError> {
        validate_name(name)?;
        Ok(Project::at(&self.root, name, &self.spec_file))
    }

    /// Create the project directory and write the specification.
    ///
    /// An existing directory is a [`RelayError::Conflict`] and is left
    /// untouched.
    pub async fn create(&self, name: &str, content: &str) -> Result<Project, RelayError> {
        let project = self.project(name)?;
        if tokio::fs::try_exists(&project.dir).await? {
            return Err(RelayError::Conflict(format!("project {name} already exists")));
        }
        validate_specification(content)?;

        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            RelayError::Internal(format!(
                "cannot create projects root {}: {e}",
                self.root.display()
            ))
        })?;
        // create_dir (not _all) so a concurrent create of the same name loses.
        match tokio::fs::create_dir(&project.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(RelayError::Conflict(format!("project {name} already exists")));
            }
            Err(e) => {
                return Err(RelayError::Internal(format!(
                    "cannot create {}: {e}",
                    project.dir.display()
                )));
            }
        }
        tokio::fs::write(&project.spec_path, content)
            .await
            .map_err(|e| {
                RelayError::Internal(format!(
                    "cannot write {}: {e}",
                    project.spec_path.display()
                ))
            })?;
        info!(project = name, dir = %project.dir.display(), "Project created");
        Ok(project)
    }

    /// Look up an existing project.
    pub async fn open(&self, name: &str) -> Result<Project, RelayError> {
        let project = self.project(name)?;
        if !tokio::fs::try_exists(&project.dir).await? {
            return Err(RelayError::NotFound(format!("project {name}")));
        }
        Ok(project)
    }

    pub async fn read_specification(&self, name: &str) -> Result<String, RelayError> {
        let project = self.open(name).await?;
        tokio::fs::read_to_string(&project.spec_path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    RelayError::NotFound(format!("specification of project {name}"))
                }
                _ => RelayError::from(e),
            })
    }

    /// Names of all project directories, sorted.
    pub async fn list(&self) -> Result<Vec<String>, RelayError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    if validate_name(name).is_ok() {
                        names.push(name.to_string());
                    }
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delete the project directory and everything in it.
    pub async fn remove_dir(&self, project: &Project) -> Result<(), RelayError> {
        tokio::fs::remove_dir_all(&project.dir).await?;
        debug!(project = %project.name, "Project directory removed");
        Ok(())
    }
}
