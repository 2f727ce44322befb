//! `Dockhand` Daemon
//!
//! Serves the container terminal, log and deployment API over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use dockhand_core::config::load_config;
use dockhand_daemon::engine::{ContainerEngine, DockerEngine};
use dockhand_daemon::server::{self, AppState};

#[derive(Parser, Debug)]
#[command(name = "dockhand-daemon")]
#[command(version, about = "Dockhand daemon - container terminal, log and deploy relay")]
struct Args {
    /// Configuration file (JSON), merged over the global settings file
    #[arg(long, env = "DOCKHAND_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP bind address
    #[arg(long, env = "DOCKHAND_ADDR")]
    addr: Option<SocketAddr>,

    /// Container engine endpoint (e.g. `unix:///var/run/docker.sock`)
    #[arg(long, env = "DOCKHAND_DOCKER_HOST")]
    docker_host: Option<String>,

    /// Directory holding deployed projects
    #[arg(long, env = "DOCKHAND_PROJECTS_ROOT")]
    projects_root: Option<PathBuf>,

    /// Log level filter for the daemon (e.g. "info", "debug", "warn").
    #[arg(long, env = "DOCKHAND_LOG_LEVEL")]
    log_level: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, env = "DOCKHAND_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(addr) = args.addr {
        config.server.addr = addr;
    }
    if let Some(host) = args.docker_host {
        config.engine.host = Some(host);
    }
    if let Some(root) = args.projects_root {
        config.deploy.projects_root = root;
    }
    if let Some(level) = args.log_level {
        config.server.log_level = level;
    }
    config.server.log_json |= args.log_json;

    let log_filter = format!("dockhand_daemon={}", config.server.log_level);
    dockhand_core::tracing_init::init_tracing(&log_filter, config.server.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.server.addr,
        projects_root = %config.deploy.projects_root.display(),
        "Starting dockhand-daemon"
    );

    let engine = DockerEngine::connect(config.engine.host.as_deref(), config.engine.timeout_secs)?;
    match engine.ping().await {
        Ok(()) => info!("Container engine reachable"),
        Err(e) => warn!(error = %e, "Container engine not reachable; requests will fail until it is"),
    }
    let engine: Arc<dyn ContainerEngine> = Arc::new(engine);
    let state = AppState::new(engine, &config);

    let listener = tokio::net::TcpListener::bind(config.server.addr).await?;

    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    // Notify systemd that the daemon is ready to serve (unix only).
    #[cfg(unix)]
    sd_notify::notify(true, &[sd_notify::NotifyState::Ready])?;

    let shutdown = async move {
        #[cfg(unix)]
        let sigterm_future = sigterm.recv();
        #[cfg(not(unix))]
        let sigterm_future = std::future::pending::<Option<()>>();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C shutdown signal");
            }
            _ = sigterm_future => {
                info!("Received SIGTERM shutdown signal");
            }
        }
    };

    server::serve(listener, state, shutdown).await?;

    info!("Daemon stopped");
    Ok(())
}
