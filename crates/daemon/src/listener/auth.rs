// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway credential check.
//!
//! A request is authorized when any of the places a client may carry the
//! token holds the configured one: the `vibox-token` cookie, the
//! `X-ViBox-Token` header, a bearer `Authorization` header, or the `token`
//! query parameter (used by websocket clients). Several may be present at
//! once, e.g. a proxied app's own bearer token next to the gateway cookie.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::header::{AUTHORIZATION, COOKIE};
use http::HeaderMap;
use vibox_engine::proxy::headers::{gateway_bearer, TOKEN_COOKIE, TOKEN_HEADER, TOKEN_QUERY_PARAM};

use super::error::ApiError;
use super::AppState;

pub(super) async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if is_authorized(request.headers(), request.uri().query(), &state.api_token) {
        return next.run(request).await;
    }
    tracing::warn!(
        method = %request.method(),
        path = %request.uri().path(),
        "rejected unauthenticated request"
    );
    ApiError::unauthorized().into_response()
}

/// True when any presented credential equals `token`.
pub fn is_authorized(headers: &HeaderMap, query: Option<&str>, token: &str) -> bool {
    !token.is_empty() && presented_tokens(headers, query).any(|candidate| candidate == token)
}

fn presented_tokens<'a>(headers: &'a HeaderMap, query: Option<&'a str>) -> impl Iterator<Item = &'a str> {
    let header = headers
        .get_all(TOKEN_HEADER)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::trim);
    let bearer = headers
        .get_all(AUTHORIZATION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(gateway_bearer);
    let cookie = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .filter(|(name, _)| *name == TOKEN_COOKIE)
        .map(|(_, value)| value);
    let query = query
        .into_iter()
        .flat_map(|q| q.split('&'))
        .filter_map(|pair| pair.split_once('='))
        .filter(|(name, _)| *name == TOKEN_QUERY_PARAM)
        .map(|(_, value)| value);
    header.chain(bearer).chain(cookie).chain(query)
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
