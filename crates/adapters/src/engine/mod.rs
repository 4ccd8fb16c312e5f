// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container engine abstraction.
//!
//! # Module layout
//!
//! - [`docker`]: Docker Engine API client over bollard
//! - `fake`: in-memory engine for tests (feature `test-support`)
//!
//! Interactive execs are attached byte streams plus an exec id for resizing.
//! One-shot execs collect stdout and stderr separately and report the exit
//! code once the command has finished.

mod docker;

pub use docker::DockerEngine;

use async_trait::async_trait;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Errors from container engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("container not found: {0}")]
    NotFound(String),
    #[error("container engine error: {0}")]
    Api(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }
}

/// Container state as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Unknown,
}

vibox_core::simple_display! {
    ContainerStatus {
        Created => "created",
        Running => "running",
        Paused => "paused",
        Restarting => "restarting",
        Removing => "removing",
        Exited => "exited",
        Dead => "dead",
        Unknown => "unknown",
    }
}

impl ContainerStatus {
    pub fn is_running(self) -> bool {
        self == ContainerStatus::Running
    }
}

/// What to create. Limits are passed through to the engine unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// Memory limit in bytes
    pub memory_limit: i64,
    /// CPU limit in nano-CPUs
    pub cpu_limit: i64,
    /// Network to attach to, engine default when `None`
    pub network: Option<String>,
}

/// An attached interactive exec.
pub struct ExecSession {
    pub exec_id: String,
    /// Combined stdout/stderr of the process (it runs under a TTY)
    pub output: Pin<Box<dyn AsyncRead + Send>>,
    /// The process's stdin
    pub input: Pin<Box<dyn AsyncWrite + Send>>,
}

impl std::fmt::Debug for ExecSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecSession")
            .field("exec_id", &self.exec_id)
            .finish_non_exhaustive()
    }
}

/// Result of a one-shot exec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Adapter for a container runtime
#[async_trait]
pub trait ContainerEngine: Send + Sync + 'static {
    /// Create (but do not start) a container, pulling the image if needed.
    /// Returns the engine's container id.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, EngineError>;

    async fn start_container(&self, container_id: &str) -> Result<(), EngineError>;

    async fn stop_container(&self, container_id: &str, timeout: Duration)
        -> Result<(), EngineError>;

    /// Force-remove a container, running or not.
    async fn remove_container(&self, container_id: &str) -> Result<(), EngineError>;

    async fn inspect_status(&self, container_id: &str) -> Result<ContainerStatus, EngineError>;

    /// IP address of the container on its network.
    async fn container_address(&self, container_id: &str) -> Result<String, EngineError>;

    /// Start `cmd` under a TTY with stdin attached.
    async fn exec_interactive(
        &self,
        container_id: &str,
        cmd: &[String],
    ) -> Result<ExecSession, EngineError>;

    async fn resize_exec(&self, exec_id: &str, cols: u16, rows: u16) -> Result<(), EngineError>;

    /// Run `cmd` to completion and collect its output.
    async fn exec_once(&self, container_id: &str, cmd: &[String])
        -> Result<ExecOutput, EngineError>;

    /// Write `content` to `path` inside the container, replacing any file there.
    async fn copy_file(
        &self,
        container_id: &str,
        path: &str,
        content: &[u8],
    ) -> Result<(), EngineError>;
}

#[cfg(any(test, feature = "test-support"))]
mod fake;

#[cfg(any(test, feature = "test-support"))]
pub use fake::{EngineCall, EngineOp, FakeEngine, FakeTerminal};
