//! Project deployment and management endpoints.

use std::convert::Infallible;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::AppState;
use crate::deploy::ProjectStatus;
use crate::error::RelayError;

#[derive(Debug, Deserialize)]
pub struct DeployRequest {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct SpecificationResponse {
    pub content: String,
}

/// `POST /api/compose/project`: deploy and stream progress events.
pub async fn deploy(
    State(state): State<AppState>,
    Json(req): Json<DeployRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, RelayError> {
    let events = state.projects.deploy(&req.name, &req.content).await?;
    let events = events.map(|event| {
        Ok(Event::default()
            .json_data(&event)
            .unwrap_or_else(|_| Event::default().data(event.message)))
    });
    Ok(Sse::new(events))
}

/// `GET /api/compose/list`
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<String>>, RelayError> {
    Ok(Json(state.projects.list().await?))
}

/// `GET /api/compose/{name}/status`
pub async fn status(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ProjectStatus>, RelayError> {
    Ok(Json(state.projects.status(&name).await?))
}

/// `GET /api/compose/{name}/yaml`
pub async fn specification(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<SpecificationResponse>, RelayError> {
    let content = state.projects.specification(&name).await?;
    Ok(Json(SpecificationResponse { content }))
}

/// `POST /api/compose/{name}/start`
pub async fn start(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, RelayError> {
    let output = state.projects.start(&name).await?;
    Ok(Json(json!({ "name": name, "action": "start", "output": output })))
}

/// `POST /api/compose/{name}/stop`
pub async fn stop(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, RelayError> {
    let output = state.projects.stop(&name).await?;
    Ok(Json(json!({ "name": name, "action": "stop", "output": output })))
}

/// `DELETE /api/compose/remove/{name}`
pub async fn remove(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, RelayError> {
    let output = state.projects.remove(&name).await?;
    Ok(Json(json!({ "name": name, "action": "remove", "output": output })))
}
