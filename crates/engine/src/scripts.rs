// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Setup script execution inside a workspace container.
//!
//! Each script is copied to `/tmp/vibox-script-{order}-{name}.sh`, marked
//! executable and run with stdout and stderr redirected to
//! `/var/log/vibox/{order}-{name}.log`. The first nonzero exit stops the run.

use thiserror::Error;
use vibox_adapters::{ContainerEngine, EngineError};
use vibox_core::Script;

/// Directory inside the container holding per-script logs.
pub const LOG_DIR: &str = "/var/log/vibox";

/// Lines of a failed script's log echoed into the gateway log.
const FAILURE_TAIL_LINES: &str = "20";

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to copy script {script}: {source}")]
    Copy { script: String, source: EngineError },
    #[error("failed to make script {script} executable: {reason}")]
    Chmod { script: String, reason: String },
    #[error("failed to execute script {script}: {source}")]
    Exec { script: String, source: EngineError },
    #[error("script {script} failed with exit code {exit_code}, see {log_path} in the container")]
    Failed {
        script: String,
        exit_code: i64,
        log_path: String,
    },
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_script_name(name: &str) -> String {
    if name.is_empty() {
        return "script".to_string();
    }
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

pub fn script_path(order: i32, safe_name: &str) -> String {
    format!("/tmp/vibox-script-{order}-{safe_name}.sh")
}

pub fn log_path(order: i32, safe_name: &str) -> String {
    format!("{LOG_DIR}/{order}-{safe_name}.log")
}

/// Run `scripts` in ascending `order` (ties keep submission order).
pub async fn run_scripts(
    engine: &dyn ContainerEngine,
    container_id: &str,
    scripts: &[Script],
) -> Result<(), ScriptError> {
    if scripts.is_empty() {
        return Ok(());
    }

    let mut ordered = scripts.to_vec();
    ordered.sort_by_key(|s| s.order);
    tracing::info!(%container_id, count = ordered.len(), "running setup scripts");

    match engine.exec_once(container_id, &args(&["mkdir", "-p", LOG_DIR])).await {
        Ok(out) if out.success() => {}
        Ok(out) => {
            tracing::warn!(%container_id, exit_code = out.exit_code, "could not create script log directory")
        }
        Err(e) => {
            tracing::warn!(%container_id, error = %e, "could not create script log directory")
        }
    }

    let total = ordered.len();
    for (i, script) in ordered.iter().enumerate() {
        tracing::info!(
            %container_id,
            script = %script.name,
            order = script.order,
            progress = %format!("{}/{total}", i + 1),
            "running script"
        );
        run_one(engine, container_id, script).await?;
    }

    tracing::info!(%container_id, "setup scripts finished");
    Ok(())
}

async fn run_one(
    engine: &dyn ContainerEngine,
    container_id: &str,
    script: &Script,
) -> Result<(), ScriptError> {
    let safe = sanitize_script_name(&script.name);
    if safe != script.name {
        tracing::warn!(original = %script.name, sanitized = %safe, "script name sanitized");
    }
    let path = script_path(script.order, &safe);
    let log = log_path(script.order, &safe);

    engine
        .copy_file(container_id, &path, script.content.as_bytes())
        .await
        .map_err(|source| ScriptError::Copy {
            script: script.name.clone(),
            source,
        })?;

    let chmod = engine
        .exec_once(container_id, &args(&["chmod", "+x", &path]))
        .await
        .map_err(|e| ScriptError::Chmod {
            script: script.name.clone(),
            reason: e.to_string(),
        })?;
    if !chmod.success() {
        return Err(ScriptError::Chmod {
            script: script.name.clone(),
            reason: format!("chmod exited with {}: {}", chmod.exit_code, chmod.stderr.trim()),
        });
    }

    // Paths are passed as positional parameters so the shell never parses them.
    let run = args(&["/bin/sh", "-c", "\"$0\" > \"$1\" 2>&1", &path, &log]);
    let out = engine
        .exec_once(container_id, &run)
        .await
        .map_err(|source| ScriptError::Exec {
            script: script.name.clone(),
            source,
        })?;

    if !out.success() {
        let tail = engine
            .exec_once(container_id, &args(&["tail", "-n", FAILURE_TAIL_LINES, &log]))
            .await
            .map(|o| o.stdout)
            .unwrap_or_default();
        tracing::error!(
            %container_id,
            script = %script.name,
            exit_code = out.exit_code,
            output = %tail,
            "script failed"
        );
        return Err(ScriptError::Failed {
            script: script.name.clone(),
            exit_code: out.exit_code,
            log_path: log,
        });
    }

    tracing::info!(%container_id, script = %script.name, log = %log, "script succeeded");
    Ok(())
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
#[path = "scripts_tests.rs"]
mod tests;
