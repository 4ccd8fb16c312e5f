// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Websocket endpoint for workspace terminals.

use async_trait::async_trait;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use vibox_core::TerminalMessage;
use vibox_engine::{Transport, TransportError, TransportSink, TransportSource};

use super::error::ApiError;
use super::AppState;

/// `GET /ws/terminal/{id}`
///
/// The workspace and its container are checked before the upgrade so the
/// client gets a plain HTTP error when no shell can be started.
pub(super) async fn connect(
    State(state): State<AppState>,
    Path(id): Path<String>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let workspace = match state.orchestrator.get_workspace(&id) {
        Ok(workspace) => workspace,
        Err(e) => {
            tracing::warn!(workspace_id = %id, error = %e, "terminal requested for unknown workspace");
            return ApiError::from(e).into_response();
        }
    };
    let Some(container_id) = workspace.container_id().map(str::to_string) else {
        return ApiError::container_not_running(format!("workspace {id} has no container")).into_response();
    };
    match state.orchestrator.engine().inspect_status(&container_id).await {
        Ok(status) if status.is_running() => {}
        Ok(status) => {
            tracing::warn!(workspace_id = %id, %container_id, %status, "terminal requested for stopped container");
            return ApiError::container_not_running(format!("container is {status}")).into_response();
        }
        Err(e) => {
            return ApiError::container_not_running(format!("failed to get container status: {e}"))
                .into_response();
        }
    }

    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };
    let bridge = state.bridge.clone();
    upgrade.on_upgrade(move |socket| async move {
        tracing::info!(workspace_id = %id, %container_id, "terminal websocket connected");
        if let Err(e) = bridge.create_session(websocket_transport(socket), &container_id).await {
            tracing::warn!(workspace_id = %id, %container_id, error = %e, "terminal session failed");
        }
    })
}

fn websocket_transport(socket: WebSocket) -> Transport {
    let (sink, stream) = socket.split();
    Transport::new(WebSocketSource(stream), WebSocketSink(sink))
}

struct WebSocketSource(SplitStream<WebSocket>);

#[async_trait]
impl TransportSource for WebSocketSource {
    async fn recv(&mut self) -> Option<Result<TerminalMessage, TransportError>> {
        loop {
            let frame = match self.0.next().await? {
                Ok(frame) => frame,
                Err(e) => return Some(Err(TransportError::Io(e.to_string()))),
            };
            let parsed = match frame {
                Message::Text(text) => serde_json::from_str(text.as_str()),
                Message::Binary(bytes) => serde_json::from_slice(&bytes),
                Message::Close(_) => return None,
                Message::Ping(_) | Message::Pong(_) => continue,
            };
            return Some(parsed.map_err(|e| TransportError::Malformed(e.to_string())));
        }
    }
}

struct WebSocketSink(SplitSink<WebSocket, Message>);

#[async_trait]
impl TransportSink for WebSocketSink {
    async fn send(&mut self, message: TerminalMessage) -> Result<(), TransportError> {
        let text = serde_json::to_string(&message).map_err(|e| TransportError::Malformed(e.to_string()))?;
        self.0
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.0.close().await {
            tracing::debug!(error = %e, "websocket close failed");
        }
    }
}
