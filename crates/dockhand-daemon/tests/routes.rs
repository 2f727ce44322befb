#![allow(clippy::unwrap_used)] // Integration tests use unwrap for brevity

//! HTTP route tests driven through `tower::ServiceExt::oneshot`.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use dockhand_core::Config;
use dockhand_daemon::server::{AppState, build_router};

use common::{FakeContainer, FakeEngine, LogScript};

fn app(engine: &Arc<FakeEngine>, root: &TempDir) -> axum::Router {
    let mut config = Config::default();
    config.deploy.projects_root = root.path().join("deployments");
    build_router(AppState::new(engine.clone(), &config))
}

fn engine() -> Arc<FakeEngine> {
    let engine = FakeEngine::new();
    engine.add(FakeContainer::running("c1", "web").with_logs(LogScript {
        framing: dockhand_daemon::engine::LogFraming::Raw,
        chunks: vec![bytes::Bytes::from_static(b"line one\nline two\n")],
        hold_open: false,
    }));
    engine.add(FakeContainer::stopped("c2", "old"));
    engine
}

/// Send a request and return (status, body text).
async fn send(app: axum::Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, String) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let resp = app.oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

fn error_message(body: &str) -> String {
    let value: Value = serde_json::from_str(body).unwrap();
    value["error"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_ok() {
    let root = TempDir::new().unwrap();
    let (status, body) = send(app(&engine(), &root), Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"status": "ok"}));
}

#[tokio::test]
async fn exec_runs_in_running_container() {
    let root = TempDir::new().unwrap();
    let (status, body) = send(
        app(&engine(), &root),
        Method::GET,
        "/api/containers/web/exec?cmd=uname%20-a",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["container_id"], "c1");
    assert_eq!(value["command"], "uname -a");
    assert_eq!(value["output"], "ran uname -a\n");
}

#[tokio::test]
async fn exec_error_statuses() {
    let root = TempDir::new().unwrap();
    let engine = engine();

    let (status, body) = send(app(&engine, &root), Method::GET, "/api/containers/ghost/exec", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(error_message(&body).contains("ghost"));

    let (status, _) = send(app(&engine, &root), Method::GET, "/api/containers/old/exec", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn single_container_logs_stream_as_sse() {
    let root = TempDir::new().unwrap();
    let (status, body) = send(
        app(&engine(), &root),
        Method::GET,
        "/api/containers/web/logs",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("data: line one\n"), "{body}");
    assert!(body.contains("data: line two\n"), "{body}");
}

#[tokio::test]
async fn aggregate_logs_unknown_container_is_404() {
    let root = TempDir::new().unwrap();
    let (status, _) = send(
        app(&engine(), &root),
        Method::GET,
        "/api/logs?containers=web,ghost",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn compose_list_and_missing_project() {
    let root = TempDir::new().unwrap();
    let engine = engine();

    let (status, body) = send(app(&engine, &root), Method::GET, "/api/compose/list", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");

    let (status, _) = send(app(&engine, &root), Method::GET, "/api/compose/ghost/status", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(app(&engine, &root), Method::GET, "/api/compose/ghost/yaml", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(app(&engine, &root), Method::DELETE, "/api/compose/remove/ghost", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deploy_validation_errors_are_plain_http_errors() {
    let root = TempDir::new().unwrap();
    let engine = engine();

    let (status, body) = send(
        app(&engine, &root),
        Method::POST,
        "/api/compose/project",
        Some(json!({"name": "bad name", "content": "services:\n  web: {}\n"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_message(&body).contains("invalid project name"));

    let (status, _) = send(
        app(&engine, &root),
        Method::POST,
        "/api/compose/project",
        Some(json!({"name": "demo", "content": "not: [valid"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    std::fs::create_dir_all(root.path().join("deployments/taken")).unwrap();
    let (status, _) = send(
        app(&engine, &root),
        Method::POST,
        "/api/compose/project",
        Some(json!({"name": "taken", "content": "services:\n  web: {}\n"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn stored_specification_is_served() {
    let root = TempDir::new().unwrap();
    let dir = root.path().join("deployments/demo");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("docker-compose.yaml"), "services:\n  web: {}\n").unwrap();

    let (status, body) = send(app(&engine(), &root), Method::GET, "/api/compose/demo/yaml", None).await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["content"], "services:\n  web: {}\n");
}
