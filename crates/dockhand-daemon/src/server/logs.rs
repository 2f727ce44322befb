//! Log streaming endpoints (server-sent events).

use std::convert::Infallible;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use serde::Deserialize;

use super::AppState;
use crate::error::RelayError;
use crate::relay::LogSession;

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    /// Comma-separated container ids or names.
    pub containers: String,
}

/// `GET /api/containers/{id}/logs`
pub async fn container_logs(
    State(state): State<AppState>,
    Path(container_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, RelayError> {
    let session = state.logs.stream_logs([container_id]).await?;
    Ok(sse(session))
}

/// `GET /api/logs?containers=a,b`
pub async fn aggregate_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, RelayError> {
    let session = state.logs.stream_logs(query.containers.split(',')).await?;
    Ok(sse(session))
}

fn sse(session: LogSession) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let prefixed = session.prefixed();
    let events = session.map(move |line| Ok(Event::default().data(line.render(prefixed))));
    Sse::new(events).keep_alive(KeepAlive::default())
}
