//! HTTP server: routes, shared state and the serve loop.

mod compose;
mod error;
mod logs;
mod terminal;

pub use terminal::websocket_transport;

use std::future::Future;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::routing::{delete, get, post};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use dockhand_core::Config;

use crate::deploy::ProjectManager;
use crate::engine::ContainerEngine;
use crate::relay::{LogAggregator, TerminalRelay};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<dyn ContainerEngine>,
    pub terminal: Arc<TerminalRelay>,
    pub logs: Arc<LogAggregator>,
    pub projects: Arc<ProjectManager>,
}

impl AppState {
    pub fn new(engine: Arc<dyn ContainerEngine>, config: &Config) -> Self {
        Self {
            terminal: Arc::new(TerminalRelay::new(
                Arc::clone(&engine),
                config.terminal.clone(),
            )),
            logs: Arc::new(LogAggregator::new(Arc::clone(&engine), config.logs.clone())),
            projects: Arc::new(ProjectManager::new(
                Arc::clone(&engine),
                config.deploy.clone(),
            )),
            engine,
        }
    }
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/containers/{id}/terminal", get(terminal::terminal))
        .route("/api/containers/{id}/exec", get(terminal::exec))
        .route("/api/containers/{id}/logs", get(logs::container_logs))
        .route("/api/logs", get(logs::aggregate_logs))
        .route("/api/compose/project", post(compose::deploy))
        .route("/api/compose/list", get(compose::list))
        .route("/api/compose/{name}/status", get(compose::status))
        .route("/api/compose/{name}/yaml", get(compose::specification))
        .route("/api/compose/{name}/start", post(compose::start))
        .route("/api/compose/{name}/stop", post(compose::stop))
        .route("/api/compose/remove/{name}", delete(compose::remove))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// `GET /api/health`
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Serve `state` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "HTTP server listening");
    }
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
