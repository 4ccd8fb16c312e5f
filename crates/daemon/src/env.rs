// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.
//!
//! Unset or empty variables fall back to their defaults, as do integers that
//! fail to parse.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";
pub const DEFAULT_MEMORY_LIMIT: i64 = 512 * 1024 * 1024;
pub const DEFAULT_CPU_LIMIT: i64 = 1_000_000_000;
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Non-empty value of `key`.
fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

/// Gateway listen port (`PORT`).
pub fn port() -> u16 {
    var("PORT")
        .and_then(|s| s.trim().parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT)
}

/// Gateway credential (`API_TOKEN`). Required; validated by `Config`.
pub fn api_token() -> Option<String> {
    var("API_TOKEN")
}

/// Container engine endpoint (`DOCKER_HOST`).
pub fn docker_host() -> String {
    var("DOCKER_HOST").unwrap_or_else(|| DEFAULT_DOCKER_HOST.to_string())
}

/// Image used when a create request names none (`DEFAULT_IMAGE`).
pub fn default_image() -> String {
    var("DEFAULT_IMAGE").unwrap_or_else(|| vibox_engine::DEFAULT_IMAGE.to_string())
}

/// Per-container memory limit in bytes (`MEMORY_LIMIT`).
pub fn memory_limit() -> i64 {
    var("MEMORY_LIMIT")
        .and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_MEMORY_LIMIT)
}

/// Per-container CPU limit in nano-CPUs (`CPU_LIMIT`).
pub fn cpu_limit() -> i64 {
    var("CPU_LIMIT")
        .and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_CPU_LIMIT)
}

/// Directory for the workspace snapshot and the lock file (`DATA_DIR`).
pub fn data_dir() -> PathBuf {
    PathBuf::from(var("DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()))
}

/// Network new containers join (`CONTAINER_NETWORK`).
pub fn container_network() -> Option<String> {
    var("CONTAINER_NETWORK")
}

/// Directory for rolling log files (`LOG_DIR`). Logs go to stderr only when
/// unset.
pub fn log_dir() -> Option<PathBuf> {
    var("LOG_DIR").map(PathBuf::from)
}

/// Graceful shutdown drain timeout (`SHUTDOWN_TIMEOUT_MS`).
pub fn shutdown_timeout() -> Duration {
    var("SHUTDOWN_TIMEOUT_MS")
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
