// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/forward/{id}/{port}/...`: HTTP into a workspace container.

use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::response::{IntoResponse, Response};
use vibox_engine::ForwardRequest;

use super::error::ApiError;
use super::AppState;

/// `ANY /forward/{id}/{port}/{*path}`
pub(super) async fn forward(
    State(state): State<AppState>,
    Path((id, port, _path)): Path<(String, String, String)>,
    request: Request,
) -> Response {
    proxy(state, id, port, request).await
}

/// `ANY /forward/{id}/{port}`
pub(super) async fn forward_root(
    State(state): State<AppState>,
    Path((id, port)): Path<(String, String)>,
    request: Request,
) -> Response {
    proxy(state, id, port, request).await
}

async fn proxy(state: AppState, id: String, port: String, request: Request) -> Response {
    let port = match parse_port(&port) {
        Ok(port) => port,
        Err(e) => return e.into_response(),
    };

    let (parts, body) = request.into_parts();
    let forward = ForwardRequest {
        path: upstream_path(parts.uri.path()),
        query: parts.uri.query().map(str::to_string),
        method: parts.method,
        headers: parts.headers,
        body: reqwest::Body::wrap_stream(body.into_data_stream()),
    };

    match state.proxy.proxy_request(&id, port, forward).await {
        Ok(response) => {
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::from_stream(body))
        }
        Err(e) => {
            tracing::warn!(workspace_id = %id, port, error = %e, "proxy request failed");
            ApiError::from(e).into_response()
        }
    }
}

fn parse_port(raw: &str) -> Result<u16, ApiError> {
    match raw.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ApiError::invalid_request(format!(
            "invalid port {raw:?}: must be between 1 and 65535"
        ))),
    }
}

/// Path below `/forward/{id}/{port}`, still percent-encoded as received.
fn upstream_path(full: &str) -> String {
    // "", "forward", id, port, rest
    match full.splitn(5, '/').nth(4) {
        Some(rest) => format!("/{rest}"),
        None => "/".to_string(),
    }
}

#[cfg(test)]
#[path = "forward_tests.rs"]
mod tests;
