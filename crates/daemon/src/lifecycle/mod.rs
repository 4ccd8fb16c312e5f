// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: configuration, startup, shutdown.

mod startup;
pub use startup::{startup, startup_with_engine};

use std::fs::File;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use vibox_adapters::EngineError;
use vibox_engine::{Orchestrator, OrchestratorConfig, ProxyConfig, ProxyError, ProxyRouter, TerminalBridge};
use vibox_storage::StoreError;

use crate::env;
use crate::listener::AppState;

/// Snapshot file name under the data directory.
pub const SNAPSHOT_FILE: &str = "workspaces.json";

/// Lock/PID file name under the data directory.
pub const LOCK_FILE: &str = "viboxd.pid";

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Gateway listen port
    pub port: u16,
    /// Gateway credential
    pub api_token: String,
    /// Container engine endpoint
    pub docker_host: String,
    pub default_image: String,
    /// Bytes per container
    pub memory_limit: i64,
    /// Nano-CPUs per container
    pub cpu_limit: i64,
    pub data_dir: PathBuf,
    /// Path to the workspace snapshot
    pub snapshot_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    pub container_network: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Configuration rooted at `data_dir` with every other setting at its
    /// default.
    pub fn new(data_dir: impl Into<PathBuf>, api_token: impl Into<String>) -> Self {
        let data_dir = data_dir.into();
        Self {
            port: env::DEFAULT_PORT,
            api_token: api_token.into(),
            docker_host: env::DEFAULT_DOCKER_HOST.to_string(),
            default_image: vibox_engine::DEFAULT_IMAGE.to_string(),
            memory_limit: env::DEFAULT_MEMORY_LIMIT,
            cpu_limit: env::DEFAULT_CPU_LIMIT,
            snapshot_path: data_dir.join(SNAPSHOT_FILE),
            lock_path: data_dir.join(LOCK_FILE),
            data_dir,
            container_network: None,
            log_dir: None,
            shutdown_timeout: env::DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Load and validate configuration from the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let config = Self {
            port: env::port(),
            docker_host: env::docker_host(),
            default_image: env::default_image(),
            memory_limit: env::memory_limit(),
            cpu_limit: env::cpu_limit(),
            container_network: env::container_network(),
            log_dir: env::log_dir(),
            shutdown_timeout: env::shutdown_timeout(),
            ..Self::new(env::data_dir(), env::api_token().unwrap_or_default())
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.docker_host.trim().is_empty() {
            return Err(ConfigError::Empty("DOCKER_HOST"));
        }
        if self.default_image.trim().is_empty() {
            return Err(ConfigError::Empty("DEFAULT_IMAGE"));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            default_image: self.default_image.clone(),
            memory_limit: self.memory_limit,
            cpu_limit: self.cpu_limit,
            network: self.container_network.clone(),
        }
    }

    pub fn proxy_config(&self) -> ProxyConfig {
        ProxyConfig::new(self.api_token.clone())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("API_TOKEN is required")]
    MissingToken,
    #[error("PORT must be between 1 and 65535")]
    InvalidPort,
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Daemon state during operation.
///
/// The listener is returned separately from startup so it can be served as
/// its own task.
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub orchestrator: Orchestrator,
    pub bridge: TerminalBridge,
    pub proxy: Arc<ProxyRouter>,
    /// When daemon started
    pub start_time: Instant,
}

/// Result of daemon startup: the daemon state and the bound listener.
pub struct StartupResult {
    pub daemon: DaemonState,
    pub listener: TcpListener,
}

impl DaemonState {
    /// Shared handles for the HTTP gateway.
    pub fn app_state(&self) -> AppState {
        AppState::new(
            self.orchestrator.clone(),
            self.bridge.clone(),
            Arc::clone(&self.proxy),
            self.config.api_token.clone(),
        )
    }

    /// Reconcile stored workspaces with their containers in the background.
    ///
    /// Runs after the listener is up so the gateway answers immediately.
    pub fn spawn_restore(&self) -> JoinHandle<()> {
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            match orchestrator.restore_workspaces().await {
                Ok(summary) => info!(?summary, "workspace restore finished"),
                Err(e) => warn!(error = %e, "workspace restore failed"),
            }
        })
    }

    /// Shutdown the daemon.
    ///
    /// Containers are preserved so the next startup can restore them.
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("shutting down daemon");

        if tokio::time::timeout(self.config.shutdown_timeout, self.bridge.close_all())
            .await
            .is_err()
        {
            warn!("timed out closing terminal sessions");
        }

        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!(error = %e, "failed to remove PID file");
            }
        }

        // Lock file is released automatically when self.lock_file is dropped
        info!(uptime_secs = self.start_time.elapsed().as_secs(), "daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),
    #[error("failed to bind {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("container engine unavailable: {0}")]
    Engine(#[from] EngineError),
    #[error("proxy setup failed: {0}")]
    Proxy(#[from] ProxyError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
