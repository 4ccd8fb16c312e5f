// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP gateway.
//!
//! Serves the workspace API, terminal websockets and forwarded container
//! traffic from one axum router. Everything except `/health` requires the
//! gateway token.

mod auth;
mod error;
mod forward;
mod terminal;
mod workspaces;

pub use auth::is_authorized;
pub use error::ApiError;

use std::future::Future;
use std::sync::Arc;

use axum::routing::{any, get, post, put};
use axum::{middleware, Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use vibox_engine::{Orchestrator, ProxyRouter, TerminalBridge};

/// Handles shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub bridge: TerminalBridge,
    pub proxy: Arc<ProxyRouter>,
    api_token: Arc<str>,
}

impl AppState {
    pub fn new(
        orchestrator: Orchestrator,
        bridge: TerminalBridge,
        proxy: Arc<ProxyRouter>,
        api_token: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            orchestrator,
            bridge,
            proxy,
            api_token: api_token.into(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/workspaces", post(workspaces::create).get(workspaces::list))
        .route(
            "/api/workspaces/{id}",
            get(workspaces::get).delete(workspaces::delete),
        )
        .route("/api/workspaces/{id}/ports", put(workspaces::update_ports))
        .route("/api/workspaces/{id}/reset", post(workspaces::reset))
        .route("/ws/terminal/{id}", get(terminal::connect))
        .route("/forward/{id}/{port}", any(forward::forward_root))
        .route("/forward/{id}/{port}/", any(forward::forward_root))
        .route("/forward/{id}/{port}/{*path}", any(forward::forward))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_token));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "vibox" }))
}

/// Serve `state` on `listener` until `shutdown` resolves.
///
/// Once it resolves no new connections are accepted, terminal sessions are
/// closed, and in-flight requests are allowed to finish.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let bridge = state.bridge.clone();
    match listener.local_addr() {
        Ok(addr) => tracing::info!(%addr, "gateway listening"),
        Err(e) => tracing::warn!(error = %e, "gateway listening on unknown address"),
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("gateway shutting down");
            bridge.close_all().await;
        })
        .await
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
