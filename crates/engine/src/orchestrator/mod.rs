// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace lifecycle.
//!
//! # Module layout
//!
//! - `provision`: background container provisioning and startup restore
//! - `runs`: which provisioning run currently owns each workspace
//!
//! Creating or resetting a workspace persists a `Creating` record right away
//! and hands the container work to a tracked background task. That task
//! reports back only through the status funnel, which tolerates the
//! workspace having been deleted in the meantime and drops writes from a run
//! that a reset or delete has superseded.
//!
//! Every read-modify-write of a record happens under one record lock, so
//! concurrent edits to different fields never overwrite each other.

mod provision;
mod runs;

pub use provision::RestoreSummary;

use crate::scripts::ScriptError;
use parking_lot::Mutex;
use runs::{ProvisionRun, Runs};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::task::TaskTracker;
use vibox_adapters::ContainerEngine;
use vibox_core::{
    Clock, Script, SystemClock, Workspace, WorkspaceConfig, WorkspaceId, WorkspaceStatus,
};
use vibox_storage::{StoreError, WorkspaceStore};

/// Default image when a create request names none.
pub const DEFAULT_IMAGE: &str = "ubuntu:22.04";

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid request: {0}")]
    InvalidArgument(String),
    #[error("workspace not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(StoreError),
    #[error("provisioning failed: {0}")]
    Provisioning(String),
    #[error(transparent)]
    Script(#[from] ScriptError),
}

impl From<StoreError> for OrchestratorError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => OrchestratorError::NotFound(id),
            StoreError::InvalidArgument(msg) => OrchestratorError::InvalidArgument(msg),
            other => OrchestratorError::Store(other),
        }
    }
}

/// Static settings applied to every container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub default_image: String,
    /// Bytes
    pub memory_limit: i64,
    /// Nano-CPUs
    pub cpu_limit: i64,
    pub network: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_image: DEFAULT_IMAGE.to_string(),
            memory_limit: 512 * 1024 * 1024,
            cpu_limit: 1_000_000_000,
            network: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateWorkspaceRequest {
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub scripts: Vec<Script>,
    #[serde(default)]
    pub exposed_ports: Vec<u16>,
    #[serde(default)]
    pub ports: BTreeMap<String, String>,
}

/// Look up a workspace by id.
///
/// The terminal bridge and proxy router depend on this seam rather than on
/// the full orchestrator.
pub trait WorkspaceResolver: Send + Sync + 'static {
    fn resolve(&self, id: &str) -> Result<Workspace, OrchestratorError>;
}

/// Owns workspace records and drives their containers.
pub struct Orchestrator<C: Clock = SystemClock> {
    inner: Arc<Inner<C>>,
}

impl<C: Clock> Clone for Orchestrator<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<C> {
    store: Arc<dyn WorkspaceStore>,
    engine: Arc<dyn ContainerEngine>,
    config: OrchestratorConfig,
    clock: C,
    tasks: TaskTracker,
    /// Record lock; also tracks the live provisioning run per workspace
    runs: Mutex<Runs>,
}

/// Who is writing a record, see [`Orchestrator::modify`].
#[derive(Clone, Copy)]
enum Writer<'a> {
    /// Field edits that never race provisioning
    Edit,
    /// Status changes from outside provisioning; dropped while a run is live
    Status,
    /// A provisioning run; dropped once superseded
    Run(&'a ProvisionRun),
}

impl<C: Clock> Orchestrator<C> {
    pub fn new(
        store: Arc<dyn WorkspaceStore>,
        engine: Arc<dyn ContainerEngine>,
        config: OrchestratorConfig,
        clock: C,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                engine,
                config,
                clock,
                tasks: TaskTracker::new(),
                runs: Mutex::new(Runs::default()),
            }),
        }
    }

    pub fn engine(&self) -> &Arc<dyn ContainerEngine> {
        &self.inner.engine
    }

    /// Persist a new `Creating` workspace and start provisioning it.
    pub fn create_workspace(
        &self,
        request: CreateWorkspaceRequest,
    ) -> Result<Workspace, OrchestratorError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(OrchestratorError::InvalidArgument("name is required".to_string()));
        }
        if request.exposed_ports.contains(&0) {
            return Err(OrchestratorError::InvalidArgument(
                "exposed ports must be between 1 and 65535".to_string(),
            ));
        }
        validate_port_labels(&request.ports)?;

        let image = request
            .image
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty())
            .unwrap_or_else(|| self.inner.config.default_image.clone());
        let config = WorkspaceConfig {
            image,
            scripts: request.scripts,
            exposed_ports: request.exposed_ports,
        };

        let mut workspace = Workspace::new(WorkspaceId::new(), name, config, self.now());
        workspace.ports = request.ports;
        let run = {
            let mut runs = self.inner.runs.lock();
            self.inner.store.create(workspace.clone())?;
            runs.start(&workspace.id)
        };
        tracing::info!(
            workspace_id = %workspace.id,
            name = %workspace.name,
            image = %workspace.config.image,
            "workspace created"
        );

        self.spawn_provision(workspace.id.clone(), workspace.config.clone(), run);
        Ok(workspace)
    }

    pub fn get_workspace(&self, id: &str) -> Result<Workspace, OrchestratorError> {
        Ok(self.inner.store.get(id)?)
    }

    pub fn list_workspaces(&self) -> Result<Vec<Workspace>, OrchestratorError> {
        Ok(self.inner.store.list()?)
    }

    /// Remove the workspace record.
    ///
    /// Provisioning still in flight is stopped first. Container removal is
    /// attempted but its failure never keeps the record around.
    pub async fn delete_workspace(&self, id: &str) -> Result<Workspace, OrchestratorError> {
        let removed = self
            .tear_down(id, |_, _| Ok(self.inner.store.delete(id)?))
            .await?;
        tracing::info!(workspace_id = %id, "workspace deleted");
        Ok(removed)
    }

    /// Replace the informational port label map.
    pub fn update_ports(
        &self,
        id: &str,
        ports: BTreeMap<String, String>,
    ) -> Result<Workspace, OrchestratorError> {
        validate_port_labels(&ports)?;
        let now = self.now();
        let workspace = self
            .modify(id, Writer::Edit, |workspace| {
                workspace.ports = ports;
                workspace.updated_at = now;
            })?
            .ok_or_else(|| OrchestratorError::NotFound(id.to_string()))?;
        tracing::info!(workspace_id = %id, count = workspace.ports.len(), "workspace ports updated");
        Ok(workspace)
    }

    /// Throw away the container and provision a fresh one from the stored
    /// config.
    ///
    /// Provisioning still in flight is stopped first, so nothing it does
    /// afterwards can land on the fresh record.
    pub async fn reset_workspace(&self, id: &str) -> Result<Workspace, OrchestratorError> {
        let now = self.now();
        let (workspace, run) = self
            .tear_down(id, |runs, mut workspace| {
                workspace.container_id = None;
                workspace.set_status(WorkspaceStatus::Creating, None, now);
                self.inner.store.update(workspace.clone())?;
                let run = runs.start(&workspace.id);
                Ok((workspace, run))
            })
            .await?;
        tracing::info!(workspace_id = %id, "workspace reset");

        self.spawn_provision(workspace.id.clone(), workspace.config.clone(), run);
        Ok(workspace)
    }

    /// Apply a status transition from outside provisioning.
    ///
    /// Never fails. The update is logged and dropped when the workspace was
    /// deleted in the meantime, or while a provisioning run owns its status.
    pub fn update_status(&self, id: &WorkspaceId, status: WorkspaceStatus, error: Option<String>) {
        self.write_status(id, Writer::Status, status, error);
    }

    fn write_status(
        &self,
        id: &WorkspaceId,
        writer: Writer<'_>,
        status: WorkspaceStatus,
        error: Option<String>,
    ) {
        let now = self.now();
        match self.modify(id, writer, |workspace| workspace.set_status(status, error, now)) {
            Ok(Some(_)) => tracing::info!(workspace_id = %id, %status, "workspace status updated"),
            Ok(None) => {
                tracing::info!(workspace_id = %id, %status, "provisioning superseded, dropping status update")
            }
            Err(OrchestratorError::NotFound(_)) => {
                tracing::warn!(workspace_id = %id, %status, "workspace gone, dropping status update")
            }
            Err(e) => {
                tracing::error!(workspace_id = %id, %status, error = %e, "failed to persist workspace status")
            }
        }
    }

    /// Read-modify-write one record under the record lock.
    ///
    /// Returns `Ok(None)` without touching the record when `writer` may not
    /// write right now.
    fn modify(
        &self,
        id: &str,
        writer: Writer<'_>,
        apply: impl FnOnce(&mut Workspace),
    ) -> Result<Option<Workspace>, OrchestratorError> {
        let runs = self.inner.runs.lock();
        let allowed = match writer {
            Writer::Edit => true,
            Writer::Status => !runs.has_live(id),
            Writer::Run(run) => runs.is_live(id, run),
        };
        if !allowed {
            return Ok(None);
        }
        let mut workspace = self.inner.store.get(id)?;
        apply(&mut workspace);
        self.inner.store.update(workspace.clone())?;
        Ok(Some(workspace))
    }

    /// Stop provisioning for `id`, remove its container, then `finish` with
    /// the record under the record lock.
    ///
    /// If another reset slipped in while the container was being removed,
    /// its run is torn down too before `finish` runs.
    async fn tear_down<T>(
        &self,
        id: &str,
        mut finish: impl FnMut(&mut Runs, Workspace) -> Result<T, OrchestratorError>,
    ) -> Result<T, OrchestratorError> {
        loop {
            let live = self.inner.runs.lock().take(id);
            if let Some(run) = live {
                tracing::info!(workspace_id = %id, "stopping in-flight provisioning");
                run.stop().await;
            }

            let removed = self.inner.store.get(id)?.container_id;
            if let Some(container_id) = removed.as_deref().filter(|c| !c.is_empty()) {
                self.remove_container_logged(id, container_id).await;
            }

            let mut runs = self.inner.runs.lock();
            let workspace = self.inner.store.get(id)?;
            if runs.has_live(id) || workspace.container_id != removed {
                continue;
            }
            return finish(&mut runs, workspace);
        }
    }

    /// Wait until every provisioning task started so far has finished.
    pub async fn wait_idle(&self) {
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        self.inner.tasks.reopen();
    }

    /// Number of provisioning tasks still running.
    pub fn pending_tasks(&self) -> usize {
        self.inner.tasks.len()
    }

    fn spawn_provision(&self, id: WorkspaceId, config: WorkspaceConfig, run: ProvisionRun) {
        let this = self.clone();
        self.inner.tasks.spawn(async move {
            let _done = run.done_guard();
            if !run.is_superseded() {
                this.provision(&id, config, &run).await;
            }
            this.inner.runs.lock().finish(&id, &run);
        });
    }

    async fn remove_container_logged(&self, id: &str, container_id: &str) {
        match self.inner.engine.remove_container(container_id).await {
            Ok(()) => tracing::info!(workspace_id = %id, %container_id, "container removed"),
            Err(e) if e.is_not_found() => {
                tracing::debug!(workspace_id = %id, %container_id, "container already gone")
            }
            Err(e) => {
                tracing::warn!(workspace_id = %id, %container_id, error = %e, "failed to remove container")
            }
        }
    }

    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.inner.clock.now()
    }
}

impl<C: Clock> WorkspaceResolver for Orchestrator<C> {
    fn resolve(&self, id: &str) -> Result<Workspace, OrchestratorError> {
        self.get_workspace(id)
    }
}

/// Container name for a workspace.
pub fn container_name(id: &WorkspaceId) -> String {
    format!("vibox-{}", id.suffix())
}

fn validate_port_labels(ports: &BTreeMap<String, String>) -> Result<(), OrchestratorError> {
    for port in ports.keys() {
        match port.parse::<u16>() {
            Ok(p) if p > 0 => {}
            _ => {
                return Err(OrchestratorError::InvalidArgument(format!(
                    "invalid port {port:?}: must be between 1 and 65535"
                )))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
