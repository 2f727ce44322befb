//! Terminal and one-shot exec endpoints.

use axum::Json;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt, future};
use serde::Deserialize;
use tracing::{debug, warn};

use dockhand_core::protocol::Frame;

use super::AppState;
use crate::error::RelayError;
use crate::relay::{ClientTransport, ExecOutput, TransportError};

#[derive(Debug, Default, Deserialize)]
pub struct CommandQuery {
    pub cmd: Option<String>,
}

/// `GET /api/containers/{id}/terminal` (WebSocket upgrade).
///
/// The container is checked before upgrading, so a missing or stopped
/// container is a plain HTTP error.
pub async fn terminal(
    State(state): State<AppState>,
    Path(container_id): Path<String>,
    Query(query): Query<CommandQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, RelayError> {
    let target = state.terminal.prepare(&container_id).await?;
    let relay = state.terminal.clone();
    Ok(ws.on_upgrade(move |socket| async move {
        match relay.attach(target, query.cmd, websocket_transport(socket)).await {
            Ok(session) => {
                session.run().await;
            }
            Err(RelayError::Disconnected) => {
                debug!(container_id, "Client left before the terminal attached");
            }
            Err(e) => warn!(container_id, error = %e, "Terminal session failed to start"),
        }
    }))
}

/// `GET /api/containers/{id}/exec`
pub async fn exec(
    State(state): State<AppState>,
    Path(container_id): Path<String>,
    Query(query): Query<CommandQuery>,
) -> Result<Json<ExecOutput>, RelayError> {
    let output = state
        .terminal
        .exec_once(&container_id, query.cmd.as_deref())
        .await?;
    Ok(Json(output))
}

/// Adapt an axum WebSocket into the relay's frame transport.
pub fn websocket_transport(socket: WebSocket) -> ClientTransport {
    let (sink, stream) = socket.split();
    let incoming = stream
        .filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(Ok(Frame::Text(text.as_str().to_owned()))),
                Ok(Message::Binary(data)) => Some(Ok(Frame::Binary(data))),
                Ok(Message::Close(_)) => Some(Ok(Frame::Close)),
                Ok(Message::Ping(_) | Message::Pong(_)) => None,
                Err(e) => Some(Err(TransportError::Io(e.to_string()))),
            })
        })
        .boxed();
    let outgoing = sink
        .sink_map_err(|e| TransportError::Io(e.to_string()))
        .with(|frame: Frame| future::ready(Ok::<_, TransportError>(to_message(frame))));
    ClientTransport::new(incoming, Box::pin(outgoing))
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(data) => Message::Binary(data),
        Frame::Close => Message::Close(None),
    }
}
