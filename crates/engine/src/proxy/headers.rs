// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Header and query rewriting for forwarded requests.
//!
//! Only credentials the gateway itself issued are removed. An application's
//! own `Authorization` header or cookies pass through untouched.

use http::header::{self, HeaderMap, HeaderName, HeaderValue};

/// Cookie holding the gateway credential.
pub const TOKEN_COOKIE: &str = "vibox-token";

/// Header holding the gateway credential.
pub const TOKEN_HEADER: &str = "x-vibox-token";

/// Query parameter holding the gateway credential.
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Connection-scoped headers that never cross a proxy.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Credential carried by a `Bearer` authorization value.
///
/// The scheme is case-insensitive and may be followed by any run of
/// whitespace. Both the auth check and the upstream scrub use this, so
/// whatever the gateway accepts as its bearer is also what it removes.
pub fn gateway_bearer(value: &str) -> Option<&str> {
    let (scheme, credential) = value.trim().split_once(char::is_whitespace)?;
    let credential = credential.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !credential.is_empty()).then_some(credential)
}

/// Headers to send upstream for an inbound request.
pub fn upstream_request_headers(inbound: &HeaderMap, gateway_token: &str) -> HeaderMap {
    let mut headers = without_hop_by_hop(inbound);
    if let Some(host) = headers.remove(header::HOST) {
        headers.insert(HeaderName::from_static("x-forwarded-host"), host);
    }
    headers.remove(TOKEN_HEADER);
    scrub_authorization(&mut headers, gateway_token);
    scrub_cookies(&mut headers);
    headers
}

/// Headers to return to the client for an upstream response.
pub fn downstream_response_headers(upstream: &HeaderMap) -> HeaderMap {
    without_hop_by_hop(upstream)
}

/// Drop the gateway token from a query string. Returns `None` when nothing
/// is left.
pub fn scrub_query(query: &str, gateway_token: &str) -> Option<String> {
    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((*pair, ""));
            !(key == TOKEN_QUERY_PARAM && value == gateway_token)
        })
        .collect();
    if kept.is_empty() {
        None
    } else {
        Some(kept.join("&"))
    }
}

fn without_hop_by_hop(source: &HeaderMap) -> HeaderMap {
    // Headers listed in Connection are hop-by-hop too.
    let listed: Vec<String> = source
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    let mut headers = HeaderMap::with_capacity(source.len());
    for (name, value) in source {
        let lower = name.as_str();
        if HOP_BY_HOP.contains(&lower) || listed.iter().any(|l| l == lower) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

fn scrub_authorization(headers: &mut HeaderMap, gateway_token: &str) {
    let values: Vec<HeaderValue> = headers
        .get_all(header::AUTHORIZATION)
        .iter()
        .filter(|v| {
            v.to_str()
                .map(|s| gateway_bearer(s) != Some(gateway_token))
                .unwrap_or(true)
        })
        .cloned()
        .collect();
    headers.remove(header::AUTHORIZATION);
    for value in values {
        headers.append(header::AUTHORIZATION, value);
    }
}

fn scrub_cookies(headers: &mut HeaderMap) {
    let mut kept = Vec::new();
    for value in headers.get_all(header::COOKIE) {
        let Ok(value) = value.to_str() else {
            kept.push(value.clone());
            continue;
        };
        let remaining: Vec<&str> = value
            .split(';')
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .filter(|pair| pair.split_once('=').map(|(k, _)| k.trim()) != Some(TOKEN_COOKIE))
            .collect();
        if remaining.is_empty() {
            continue;
        }
        if let Ok(value) = HeaderValue::from_str(&remaining.join("; ")) {
            kept.push(value);
        }
    }
    headers.remove(header::COOKIE);
    for value in kept {
        headers.append(header::COOKIE, value);
    }
}

#[cfg(test)]
#[path = "headers_tests.rs"]
mod tests;
