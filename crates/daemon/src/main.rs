// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! viboxd: the ViBox gateway daemon.

use std::process::ExitCode;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use vibox_daemon::{listener, logging, startup, Config, LifecycleError, StartupResult};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("viboxd: {e}");
            return ExitCode::FAILURE;
        }
    };
    let _log_guard = logging::init(config.log_dir.as_deref());

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "daemon failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), LifecycleError> {
    info!(port = config.port, data_dir = %config.data_dir.display(), "starting viboxd");
    let StartupResult { mut daemon, listener } = startup(&config).await?;

    let shutdown = CancellationToken::new();
    let mut server = {
        let shutdown = shutdown.clone();
        tokio::spawn(listener::serve(listener, daemon.app_state(), async move {
            shutdown.cancelled().await
        }))
    };
    let _restore = daemon.spawn_restore();

    tokio::select! {
        _ = wait_for_signal() => {
            info!("shutdown signal received");
            shutdown.cancel();
            match tokio::time::timeout(config.shutdown_timeout, &mut server).await {
                Ok(result) => log_server_exit(result),
                Err(_) => warn!(timeout = ?config.shutdown_timeout, "gateway drain timed out"),
            }
        }
        result = &mut server => {
            // The server only stops on its own when accepting fails.
            log_server_exit(result);
        }
    }

    daemon.shutdown().await
}

fn log_server_exit(result: Result<std::io::Result<()>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(())) => info!("gateway stopped"),
        Ok(Err(e)) => error!(error = %e, "gateway failed"),
        Err(e) => error!(error = %e, "gateway task panicked"),
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
