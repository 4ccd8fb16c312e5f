// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{create_running, setup, TestContext};
use axum::extract::Request;
use axum::routing::get;
use axum::{Json, Router};
use http::HeaderMap;
use serde_json::{json, Value};
use vibox_adapters::{ContainerStatus, EngineOp};

const TOKEN: &str = "gateway-secret";

/// Upstream that echoes what it received.
async fn echo(request: Request) -> Json<Value> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, 1024 * 1024).await.unwrap_or_default();
    let headers: serde_json::Map<String, Value> = parts
        .headers
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v.to_str().unwrap_or_default())))
        .collect();
    Json(json!({
        "method": parts.method.as_str(),
        "path": parts.uri.path(),
        "query": parts.uri.query(),
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
    }))
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(5)).await;
    "late"
}

async fn redirect() -> (StatusCode, [(http::HeaderName, &'static str); 1]) {
    (StatusCode::FOUND, [(http::header::LOCATION, "/elsewhere")])
}

/// Start the upstream on an ephemeral port and return the port.
async fn upstream() -> u16 {
    let app = Router::new()
        .route("/slow", get(slow))
        .route("/redirect", get(redirect))
        .fallback(echo);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    port
}

fn router(ctx: &TestContext, config: ProxyConfig) -> ProxyRouter {
    ProxyRouter::new(
        Arc::new(ctx.orchestrator.clone()),
        Arc::new(ctx.engine.clone()),
        config,
    )
    .unwrap()
}

fn forward(method: Method, path: &str, query: Option<&str>, headers: HeaderMap, body: &str) -> ForwardRequest {
    ForwardRequest {
        method,
        headers,
        path: path.to_string(),
        query: query.map(str::to_string),
        body: reqwest::Body::from(body.to_string()),
    }
}

fn get_request(path: &str) -> ForwardRequest {
    forward(Method::GET, path, None, HeaderMap::new(), "")
}

async fn body_json(response: http::Response<ProxyBody>) -> Value {
    let mut body = response.into_body();
    let mut bytes = Vec::new();
    while let Some(chunk) = body.next().await {
        bytes.extend_from_slice(&chunk.unwrap());
    }
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn forwards_method_path_query_and_body() {
    let ctx = setup();
    let workspace = create_running(&ctx, "web").await;
    let port = upstream().await;
    let proxy = router(&ctx, ProxyConfig::new(TOKEN));

    let request = forward(Method::POST, "/api/items", Some("page=2"), HeaderMap::new(), "{\"a\":1}");
    let response = proxy.proxy_request(&workspace.id, port, request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let echoed = body_json(response).await;
    assert_eq!(echoed["method"], "POST");
    assert_eq!(echoed["path"], "/api/items");
    assert_eq!(echoed["query"], "page=2");
    assert_eq!(echoed["body"], "{\"a\":1}");
}

#[tokio::test]
async fn strips_gateway_credentials_only() {
    let ctx = setup();
    let workspace = create_running(&ctx, "web").await;
    let port = upstream().await;
    let proxy = router(&ctx, ProxyConfig::new(TOKEN));

    let mut headers = HeaderMap::new();
    headers.insert("x-vibox-token", TOKEN.parse().unwrap());
    headers.insert("authorization", "Bearer app-token".parse().unwrap());
    headers.insert(
        "cookie",
        format!("vibox-token={TOKEN}; app_session=xyz").parse().unwrap(),
    );
    let request = forward(Method::GET, "/", Some(&format!("token={TOKEN}&q=1")), headers, "");

    let echoed = body_json(proxy.proxy_request(&workspace.id, port, request).await.unwrap()).await;

    let seen = &echoed["headers"];
    assert!(seen.get("x-vibox-token").is_none());
    assert_eq!(seen["authorization"], "Bearer app-token");
    assert_eq!(seen["cookie"], "app_session=xyz");
    assert_eq!(echoed["query"], "q=1");
}

#[tokio::test]
async fn gateway_bearer_is_removed() {
    let ctx = setup();
    let workspace = create_running(&ctx, "web").await;
    let port = upstream().await;
    let proxy = router(&ctx, ProxyConfig::new(TOKEN));

    for value in [format!("Bearer {TOKEN}"), format!("Bearer  {TOKEN}"), format!("bearer\t{TOKEN} ")] {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", value.parse().unwrap());
        let request = forward(Method::GET, "/", None, headers, "");

        let echoed = body_json(proxy.proxy_request(&workspace.id, port, request).await.unwrap()).await;
        assert!(echoed["headers"].get("authorization").is_none(), "{value:?} reached upstream");
    }
}

#[tokio::test]
async fn redirects_are_passed_back_not_followed() {
    let ctx = setup();
    let workspace = create_running(&ctx, "web").await;
    let port = upstream().await;
    let proxy = router(&ctx, ProxyConfig::new(TOKEN));

    let response = proxy
        .proxy_request(&workspace.id, port, get_request("/redirect"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[http::header::LOCATION], "/elsewhere");
}

#[tokio::test]
async fn unknown_workspace_is_not_found() {
    let ctx = setup();
    let proxy = router(&ctx, ProxyConfig::new(TOKEN));

    let err = proxy
        .proxy_request("ws-missing", 8080, get_request("/"))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, ProxyError::NotFound(_)));
    assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn workspace_without_container_is_not_found() {
    let ctx = setup();
    ctx.engine.fail(EngineOp::Create, "no image");
    let workspace = create_running(&ctx, "web").await;
    let proxy = router(&ctx, ProxyConfig::new(TOKEN));

    let err = proxy
        .proxy_request(&workspace.id, 8080, get_request("/"))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ProxyError::NotFound(_)));
}

#[tokio::test]
async fn stopped_container_is_bad_gateway() {
    let ctx = setup();
    let workspace = create_running(&ctx, "web").await;
    ctx.engine
        .set_status(workspace.container_id().unwrap(), ContainerStatus::Exited);
    let proxy = router(&ctx, ProxyConfig::new(TOKEN));

    let err = proxy
        .proxy_request(&workspace.id, 8080, get_request("/"))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, ProxyError::BadGateway(_)));
    assert_eq!(err.code(), "BAD_GATEWAY");
}

#[tokio::test]
async fn refused_connection_is_bad_gateway() {
    let ctx = setup();
    let workspace = create_running(&ctx, "web").await;
    let port = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let proxy = router(&ctx, ProxyConfig::new(TOKEN));

    let err = proxy
        .proxy_request(&workspace.id, port, get_request("/"))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, ProxyError::BadGateway(_)), "{err}");
}

#[tokio::test]
async fn slow_upstream_is_gateway_timeout() {
    let ctx = setup();
    let workspace = create_running(&ctx, "web").await;
    let port = upstream().await;
    let config = ProxyConfig {
        response_header_timeout: Duration::from_millis(100),
        ..ProxyConfig::new(TOKEN)
    };
    let proxy = router(&ctx, config);

    let err = proxy
        .proxy_request(&workspace.id, port, get_request("/slow"))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, ProxyError::GatewayTimeout(_)), "{err}");
    assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn port_zero_is_invalid() {
    let ctx = setup();
    let proxy = router(&ctx, ProxyConfig::new(TOKEN));

    let err = proxy.proxy_request("ws-x", 0, get_request("/")).await.err().unwrap();
    assert!(matches!(err, ProxyError::InvalidRequest(_)));
}

#[tokio::test]
async fn full_target_times_out_waiting_for_a_slot() {
    let ctx = setup();
    let workspace = create_running(&ctx, "web").await;
    let port = upstream().await;
    let config = ProxyConfig {
        max_conns_per_target: 1,
        response_header_timeout: Duration::from_millis(200),
        ..ProxyConfig::new(TOKEN)
    };
    let proxy = router(&ctx, config);

    // Body not read yet, so the only slot stays taken.
    let held = proxy
        .proxy_request(&workspace.id, port, get_request("/first"))
        .await
        .unwrap();

    let err = proxy
        .proxy_request(&workspace.id, port, get_request("/second"))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ProxyError::GatewayTimeout(_)), "{err}");

    drop(held);
    let response = proxy
        .proxy_request(&workspace.id, port, get_request("/third"))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["path"], "/third");
}

#[tokio::test]
async fn idle_targets_are_forgotten() {
    let ctx = setup();
    let workspace = create_running(&ctx, "web").await;
    let first = upstream().await;
    let second = upstream().await;
    let proxy = router(&ctx, ProxyConfig::new(TOKEN));

    let open = proxy
        .proxy_request(&workspace.id, first, get_request("/"))
        .await
        .unwrap();
    let done = proxy
        .proxy_request(&workspace.id, second, get_request("/"))
        .await
        .unwrap();
    body_json(done).await;

    assert_eq!(proxy.active_targets(), 1);
    body_json(open).await;
    assert_eq!(proxy.active_targets(), 0);
}

#[yare::parameterized(
    ipv4          = { "172.17.0.2", 8080, "/a", None, "http://172.17.0.2:8080/a" },
    ipv6          = { "fd00::2", 3000, "/", None, "http://[fd00::2]:3000/" },
    missing_slash = { "10.0.0.1", 80, "api", Some("x=1"), "http://10.0.0.1:80/api?x=1" },
    token_only    = { "10.0.0.1", 80, "/", Some("token=gateway-secret"), "http://10.0.0.1:80/" },
)]
fn builds_target_urls(address: &str, port: u16, path: &str, query: Option<&str>, expected: &str) {
    let authority = target_authority(address, port);
    assert_eq!(target_url(&authority, path, query, TOKEN), expected);
}
