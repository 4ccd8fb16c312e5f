// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing subscriber setup.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Prefix of the daily log files under `LOG_DIR`.
pub const LOG_FILE_PREFIX: &str = "viboxd.log";

/// Install the global subscriber: `RUST_LOG` filtering (default `info`), a
/// stderr layer, and a daily-rolling file layer when `log_dir` is set.
///
/// The returned guard flushes the file writer on drop and must live as long
/// as the process logs.
pub fn init(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = fmt::layer().with_writer(std::io::stderr);

    let mut create_failed = None;
    let (file, guard) = match log_dir {
        Some(dir) => match std::fs::create_dir_all(dir) {
            Ok(()) => {
                let (writer, guard) =
                    tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX));
                let layer = fmt::layer().with_ansi(false).with_writer(writer);
                (Some(layer), Some(guard))
            }
            Err(e) => {
                create_failed = Some(e);
                (None, None)
            }
        },
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file)
        .try_init();

    if let (Some(dir), Some(e)) = (log_dir, create_failed) {
        tracing::warn!(directory = %dir.display(), error = %e, "failed to create log directory, logging to stderr only");
    }
    guard
}
