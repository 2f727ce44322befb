//! Configuration resolution for Dockhand.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/dockhand/settings.json)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)
//!
//! Files may be partial: they are merged key-by-key over the lower layers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};

/// Complete Dockhand configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub terminal: TerminalConfig,
    pub logs: LogsConfig,
    pub deploy: DeployConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub log_level: String,
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

/// Container engine connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// `unix:///path`, `tcp://host:port` or `http://host:port`.
    /// `None` uses the platform defaults (`DOCKER_HOST`, then the local socket).
    pub host: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: None,
            timeout_secs: 120,
        }
    }
}

/// Interactive terminal sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub default_command: String,
    /// Engine output is forwarded in reads of at most this many bytes.
    pub chunk_size: usize,
    /// How long to wait for a leading `command` frame before falling back
    /// to `default_command`.
    pub command_wait_ms: u64,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            default_command: "/bin/sh".to_string(),
            chunk_size: 4096,
            command_wait_ms: 2000,
        }
    }
}

impl TerminalConfig {
    pub const fn command_wait(&self) -> Duration {
        Duration::from_millis(self.command_wait_ms)
    }
}

/// Log aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
    /// Number of most recent lines replayed at attach time.
    pub tail: u32,
    pub channel_capacity: usize,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            tail: 100,
            channel_capacity: 256,
        }
    }
}

/// Project deployment.
///
/// Argument templates accept the placeholders `{project}`, `{file}` and `{dir}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Directory holding one sub-directory per deployed project.
    pub projects_root: PathBuf,
    pub spec_file_name: String,
    pub program: PathBuf,
    pub up_args: Vec<String>,
    pub start_args: Vec<String>,
    pub stop_args: Vec<String>,
    pub down_args: Vec<String>,
    /// Label the engine attaches to every container of a project.
    pub project_label: String,
    /// Inactivity timeout of the deploy event stream.
    pub idle_timeout_ms: u64,
    pub channel_capacity: usize,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            projects_root: PathBuf::from("deployments"),
            spec_file_name: "docker-compose.yaml".to_string(),
            program: PathBuf::from("docker"),
            up_args: compose_args(&["up", "-d"]),
            start_args: compose_args(&["start"]),
            stop_args: compose_args(&["stop"]),
            down_args: compose_args(&["down"]),
            project_label: "com.docker.compose.project".to_string(),
            idle_timeout_ms: 30_000,
            channel_capacity: 256,
        }
    }
}

impl DeployConfig {
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

fn compose_args(verb: &[&str]) -> Vec<String> {
    ["compose", "-p", "{project}", "-f", "{file}"]
        .iter()
        .chain(verb)
        .map(|s| (*s).to_string())
        .collect()
}

/// Load configuration with hierarchical resolution.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut merged = serde_json::to_value(Config::default())?;

    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            merge_json(&mut merged, load_config_file(&global_path)?);
            debug!(path = %global_path.display(), "Loaded global config");
        }
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file {} does not exist",
                path.display()
            )));
        }
        merge_json(&mut merged, load_config_file(path)?);
        debug!(path = %path.display(), "Loaded config file");
    }

    let mut config: Config = serde_json::from_value(merged)
        .map_err(|e| Error::Config(format!("Invalid configuration: {e}")))?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("dockhand").join("settings.json"))
}

fn load_config_file(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

/// Recursively overlay `overlay` onto `base`. Objects merge per key,
/// everything else is replaced.
fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(addr) = var("DOCKHAND_ADDR").and_then(|v| v.parse().ok()) {
        config.server.addr = addr;
    }
    if let Some(level) = var("DOCKHAND_LOG_LEVEL") {
        config.server.log_level = level;
    }
    if let Some(host) = var("DOCKHAND_DOCKER_HOST") {
        config.engine.host = Some(host);
    }
    if let Some(root) = var("DOCKHAND_PROJECTS_ROOT") {
        config.deploy.projects_root = PathBuf::from(root);
    }
    if let Some(ms) = var("DOCKHAND_DEPLOY_IDLE_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
        config.deploy.idle_timeout_ms = ms;
    }
    if let Some(tail) = var("DOCKHAND_LOG_TAIL").and_then(|v| v.parse().ok()) {
        config.logs.tail = tail;
    }
}
