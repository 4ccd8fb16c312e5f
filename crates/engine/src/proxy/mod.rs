// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP forwarding into workspace containers.
//!
//! A request for `(workspace, port, path)` is sent to
//! `http://<container address>:<port><path>` over a shared client. Requests
//! to one target share a bounded number of connection slots; the slot is held
//! until the response body has been fully streamed. Waiting for a slot counts
//! against the response-header timeout, and targets with no request in flight
//! are dropped from the slot table.

pub mod headers;

use crate::orchestrator::{OrchestratorError, WorkspaceResolver};
use bytes::Bytes;
use futures_util::stream::{Stream, StreamExt};
use http::{Method, StatusCode};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use vibox_adapters::ContainerEngine;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("workspace not found: {0}")]
    NotFound(String),
    #[error("bad gateway: {0}")]
    BadGateway(String),
    #[error("gateway timeout: {0}")]
    GatewayTimeout(String),
    #[error("invalid proxy request: {0}")]
    InvalidRequest(String),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::NotFound(_) => StatusCode::NOT_FOUND,
            ProxyError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ProxyError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Machine-readable code for error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ProxyError::NotFound(_) => "NOT_FOUND",
            ProxyError::BadGateway(_) => "BAD_GATEWAY",
            ProxyError::GatewayTimeout(_) => "GATEWAY_TIMEOUT",
            ProxyError::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }

    fn from_upstream(target: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProxyError::GatewayTimeout(format!("{target}: {e}"))
        } else if e.is_connect() {
            ProxyError::BadGateway(format!("unable to reach {target}: {e}"))
        } else {
            ProxyError::BadGateway(format!("{target}: {e}"))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Gateway credential, scrubbed from forwarded requests
    pub gateway_token: String,
    pub connect_timeout: Duration,
    /// Upper bound on waiting for the upstream response headers
    pub response_header_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_idle_per_target: usize,
    /// Concurrent requests per `address:port`
    pub max_conns_per_target: usize,
}

impl ProxyConfig {
    pub fn new(gateway_token: impl Into<String>) -> Self {
        Self {
            gateway_token: gateway_token.into(),
            connect_timeout: Duration::from_secs(10),
            response_header_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(90),
            max_idle_per_target: 10,
            max_conns_per_target: 100,
        }
    }
}

/// Response body streamed from the container.
pub type ProxyBody = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// The parts of an inbound request that get forwarded.
pub struct ForwardRequest {
    pub method: Method,
    pub headers: http::HeaderMap,
    /// Path below the forward prefix, e.g. `/api/items`
    pub path: String,
    pub query: Option<String>,
    pub body: reqwest::Body,
}

pub struct ProxyRouter {
    resolver: Arc<dyn WorkspaceResolver>,
    engine: Arc<dyn ContainerEngine>,
    client: reqwest::Client,
    config: ProxyConfig,
    slots: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl ProxyRouter {
    pub fn new(
        resolver: Arc<dyn WorkspaceResolver>,
        engine: Arc<dyn ContainerEngine>,
        config: ProxyConfig,
    ) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.idle_timeout)
            .pool_max_idle_per_host(config.max_idle_per_target)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ProxyError::BadGateway(format!("failed to build http client: {e}")))?;
        Ok(Self {
            resolver,
            engine,
            client,
            config,
            slots: Mutex::new(HashMap::new()),
        })
    }

    /// Forward `request` to `port` in the workspace's container.
    ///
    /// On error nothing has been sent to the client; callers answer with
    /// [`ProxyError::status_code`].
    pub async fn proxy_request(
        &self,
        workspace_id: &str,
        port: u16,
        request: ForwardRequest,
    ) -> Result<http::Response<ProxyBody>, ProxyError> {
        if port == 0 {
            return Err(ProxyError::InvalidRequest("port must be between 1 and 65535".to_string()));
        }

        let workspace = self.resolver.resolve(workspace_id).map_err(|e| match e {
            OrchestratorError::NotFound(id) => ProxyError::NotFound(id),
            other => ProxyError::BadGateway(other.to_string()),
        })?;
        let container_id = workspace
            .container_id()
            .ok_or_else(|| ProxyError::NotFound(format!("{workspace_id} has no container")))?;
        let address = self
            .engine
            .container_address(container_id)
            .await
            .map_err(|e| ProxyError::BadGateway(format!("container not reachable: {e}")))?;

        let target = target_authority(&address, port);
        let url = target_url(&target, &request.path, request.query.as_deref(), &self.config.gateway_token);
        let url = reqwest::Url::parse(&url)
            .map_err(|e| ProxyError::InvalidRequest(format!("invalid upstream url {url:?}: {e}")))?;
        tracing::debug!(%workspace_id, %container_id, method = %request.method, %url, "forwarding request");

        let timeout = self.config.response_header_timeout;
        let deadline = tokio::time::Instant::now() + timeout;
        let permit = match tokio::time::timeout_at(deadline, self.slot(&target).acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(ProxyError::BadGateway(format!("{target}: connection slots closed"))),
            Err(_) => {
                return Err(ProxyError::GatewayTimeout(format!(
                    "{target}: no free connection within {timeout:?}"
                )))
            }
        };

        let upstream = self
            .client
            .request(request.method, url)
            .headers(headers::upstream_request_headers(&request.headers, &self.config.gateway_token))
            .body(request.body);
        let response = match tokio::time::timeout_at(deadline, upstream.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(ProxyError::from_upstream(&target, e)),
            Err(_) => {
                return Err(ProxyError::GatewayTimeout(format!(
                    "{target}: no response within {timeout:?}"
                )))
            }
        };
        tracing::debug!(%workspace_id, status = %response.status(), "upstream responded");

        let status = response.status();
        let response_headers = headers::downstream_response_headers(response.headers());
        let body: ProxyBody = Box::pin(response.bytes_stream().map(move |chunk| {
            // The slot stays taken until the body is done.
            let _permit = &permit;
            chunk
        }));

        let mut forwarded = http::Response::new(body);
        *forwarded.status_mut() = status;
        *forwarded.headers_mut() = response_headers;
        Ok(forwarded)
    }

    /// Targets with a request or response body in flight.
    pub fn active_targets(&self) -> usize {
        let mut slots = self.slots.lock();
        prune_idle(&mut slots);
        slots.len()
    }

    fn slot(&self, target: &str) -> Arc<Semaphore> {
        let mut slots = self.slots.lock();
        prune_idle(&mut slots);
        Arc::clone(
            slots
                .entry(target.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(self.config.max_conns_per_target.max(1)))),
        )
    }
}

/// Permits and waiters each hold a clone, so a lone reference means idle.
fn prune_idle(slots: &mut HashMap<String, Arc<Semaphore>>) {
    slots.retain(|_, slot| Arc::strong_count(slot) > 1);
}

fn target_authority(address: &str, port: u16) -> String {
    if address.contains(':') {
        format!("[{address}]:{port}")
    } else {
        format!("{address}:{port}")
    }
}

fn target_url(authority: &str, path: &str, query: Option<&str>, gateway_token: &str) -> String {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    match query.and_then(|q| headers::scrub_query(q, gateway_token)) {
        Some(query) => format!("http://{authority}{path}?{query}"),
        None => format!("http://{authority}{path}"),
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
