// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use fs2::FileExt;
use tokio::net::TcpListener;
use tracing::{info, warn};
use vibox_adapters::{ContainerEngine, DockerEngine};
use vibox_core::SystemClock;
use vibox_engine::{Orchestrator, ProxyRouter, TerminalBridge};
use vibox_storage::{FileStore, WorkspaceStore};

use super::{Config, DaemonState, LifecycleError, StartupResult};

/// Start the daemon against the Docker engine named by `config`.
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    guarded(config, startup_inner(config, None)).await
}

/// Start the daemon with an already-built container engine.
pub async fn startup_with_engine(
    config: &Config,
    engine: Arc<dyn ContainerEngine>,
) -> Result<StartupResult, LifecycleError> {
    guarded(config, startup_inner(config, Some(engine))).await
}

async fn guarded(
    config: &Config,
    startup: impl std::future::Future<Output = Result<StartupResult, LifecycleError>>,
) -> Result<StartupResult, LifecycleError> {
    match startup.await {
        Ok(result) => Ok(result),
        Err(e) => {
            // Don't clean up if we failed to acquire the lock:
            // the PID file belongs to the already-running daemon.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(
    config: &Config,
    engine: Option<Arc<dyn ContainerEngine>>,
) -> Result<StartupResult, LifecycleError> {
    // 1. Create data directory (needed for lock and snapshot)
    std::fs::create_dir_all(&config.data_dir)?;

    // 2. Acquire lock file FIRST - prevents two daemons sharing a snapshot.
    // Open without truncating so a running daemon's PID survives.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;

    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // 3. Load workspace records
    let store = FileStore::open(&config.snapshot_path)?;
    let count = store.list().map(|w| w.len()).unwrap_or(0);
    info!(path = %config.snapshot_path.display(), count, "loaded workspace snapshot");

    // 4. Connect the container engine
    let engine = match engine {
        Some(engine) => engine,
        None => connect_engine(&config.docker_host).await?,
    };

    // 5. Build services
    let orchestrator = Orchestrator::new(
        Arc::new(store),
        Arc::clone(&engine),
        config.orchestrator_config(),
        SystemClock,
    );
    let bridge = TerminalBridge::new(Arc::clone(&engine), SystemClock);
    let proxy = Arc::new(ProxyRouter::new(
        Arc::new(orchestrator.clone()),
        engine,
        config.proxy_config(),
    )?);

    // 6. Bind (LAST - only after all validation passes)
    let addr = config.listen_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| LifecycleError::BindFailed(addr, e))?;

    Ok(StartupResult {
        daemon: DaemonState {
            config: config.clone(),
            lock_file,
            orchestrator,
            bridge,
            proxy,
            start_time: Instant::now(),
        },
        listener,
    })
}

async fn connect_engine(host: &str) -> Result<Arc<dyn ContainerEngine>, LifecycleError> {
    let engine = DockerEngine::connect(host)?;
    engine.ping().await?;
    info!(%host, "connected to container engine");
    Ok(Arc::new(engine))
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    if config.lock_path.exists() {
        if let Err(e) = std::fs::remove_file(&config.lock_path) {
            warn!(error = %e, "failed to remove PID file during cleanup");
        }
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
