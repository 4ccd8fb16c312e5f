// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background provisioning and startup restore.

use super::runs::ProvisionRun;
use super::{container_name, Orchestrator, OrchestratorError, Writer};
use crate::scripts;
use vibox_adapters::ContainerSpec;
use vibox_core::{Clock, WorkspaceConfig, WorkspaceId, WorkspaceStatus};

/// Outcome counts from [`Orchestrator::restore_workspaces`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Container was already running
    pub running: usize,
    /// Stopped container started again
    pub started: usize,
    /// Sent back through provisioning
    pub reprovisioned: usize,
    /// Marked `Error`
    pub failed: usize,
    /// Left alone (already in `Error`)
    pub skipped: usize,
}

impl<C: Clock> Orchestrator<C> {
    /// Create, record, start and set up the container for a workspace.
    ///
    /// Steps run strictly in order. The first failure marks the workspace
    /// `Error` and leaves any started container in place for inspection.
    /// Once `run` is superseded the remaining steps are skipped and nothing
    /// more is written; a container created but never recorded is removed.
    pub(crate) async fn provision(&self, id: &WorkspaceId, config: WorkspaceConfig, run: &ProvisionRun) {
        let engine = &self.inner.engine;
        let spec = ContainerSpec {
            name: container_name(id),
            image: config.image.clone(),
            memory_limit: self.inner.config.memory_limit,
            cpu_limit: self.inner.config.cpu_limit,
            network: self.inner.config.network.clone(),
        };
        tracing::info!(workspace_id = %id, image = %spec.image, container = %spec.name, "provisioning workspace");

        // Always runs to completion; a superseded run removes the result below.
        let container_id = match engine.create_container(&spec).await {
            Ok(container_id) => container_id,
            Err(e) => {
                tracing::error!(workspace_id = %id, error = %e, "failed to create container");
                self.report(
                    run,
                    id,
                    WorkspaceStatus::Error,
                    Some(format!("failed to create container: {e}")),
                );
                return;
            }
        };

        let now = self.now();
        let attached = self.modify(id, Writer::Run(run), |workspace| {
            workspace.container_id = Some(container_id.clone());
            workspace.updated_at = now;
        });
        match attached {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::info!(workspace_id = %id, %container_id, "provisioning superseded, removing its container");
                self.remove_container_logged(id, &container_id).await;
                return;
            }
            Err(e) => {
                tracing::error!(workspace_id = %id, %container_id, error = %e, "failed to record container, removing it");
                if let Err(e) = engine.remove_container(&container_id).await {
                    tracing::warn!(workspace_id = %id, %container_id, error = %e, "failed to remove unrecorded container");
                }
                self.report(
                    run,
                    id,
                    WorkspaceStatus::Error,
                    Some(format!("failed to update workspace: {e}")),
                );
                return;
            }
        }

        let Some(started) = run.or_superseded(engine.start_container(&container_id)).await else {
            tracing::info!(workspace_id = %id, %container_id, "provisioning superseded before start finished");
            return;
        };
        if let Err(e) = started {
            tracing::error!(workspace_id = %id, %container_id, error = %e, "failed to start container");
            self.report(
                run,
                id,
                WorkspaceStatus::Error,
                Some(format!("failed to start container: {e}")),
            );
            return;
        }

        let Some(scripted) = run
            .or_superseded(scripts::run_scripts(&**engine, &container_id, &config.scripts))
            .await
        else {
            tracing::info!(workspace_id = %id, %container_id, "provisioning superseded during setup scripts");
            return;
        };
        if let Err(e) = scripted {
            tracing::error!(workspace_id = %id, %container_id, error = %e, "setup scripts failed");
            self.report(
                run,
                id,
                WorkspaceStatus::Error,
                Some(format!("script execution failed: {e}")),
            );
            return;
        }

        tracing::info!(workspace_id = %id, %container_id, "workspace ready");
        self.report(run, id, WorkspaceStatus::Running, None);
    }

    /// Status funnel for a provisioning run.
    fn report(&self, run: &ProvisionRun, id: &WorkspaceId, status: WorkspaceStatus, error: Option<String>) {
        self.write_status(id, Writer::Run(run), status, error);
    }

    /// Reconcile stored workspaces with the engine after a restart.
    ///
    /// - `Error` records are left alone.
    /// - `Creating` records were interrupted mid-provisioning and start over.
    /// - A running container marks the workspace `Running`.
    /// - A stopped container is started again.
    /// - A missing container is re-provisioned from the stored config.
    ///
    /// Individual failures are recorded on the workspace, never returned.
    pub async fn restore_workspaces(&self) -> Result<RestoreSummary, OrchestratorError> {
        let workspaces = self.list_workspaces()?;
        let mut summary = RestoreSummary::default();
        tracing::info!(count = workspaces.len(), "restoring workspaces");

        for workspace in workspaces {
            let id = workspace.id.clone();
            if workspace.status == WorkspaceStatus::Error {
                summary.skipped += 1;
                continue;
            }
            let container_id = workspace.container_id().map(str::to_string);

            let Some(container_id) = container_id.filter(|_| workspace.status != WorkspaceStatus::Creating)
            else {
                self.reprovision(&id).await;
                summary.reprovisioned += 1;
                continue;
            };

            match self.inner.engine.inspect_status(&container_id).await {
                Ok(status) if status.is_running() => {
                    if workspace.status != WorkspaceStatus::Running {
                        self.update_status(&id, WorkspaceStatus::Running, None);
                    }
                    summary.running += 1;
                }
                Ok(status) => {
                    tracing::info!(workspace_id = %id, %container_id, %status, "starting stopped container");
                    match self.inner.engine.start_container(&container_id).await {
                        Ok(()) => {
                            self.update_status(&id, WorkspaceStatus::Running, None);
                            summary.started += 1;
                        }
                        Err(e) => {
                            self.update_status(
                                &id,
                                WorkspaceStatus::Error,
                                Some(format!("failed to start container: {e}")),
                            );
                            summary.failed += 1;
                        }
                    }
                }
                Err(e) if e.is_not_found() => {
                    tracing::warn!(workspace_id = %id, %container_id, "container missing, re-provisioning");
                    self.reprovision(&id).await;
                    summary.reprovisioned += 1;
                }
                Err(e) => {
                    self.update_status(
                        &id,
                        WorkspaceStatus::Error,
                        Some(format!("failed to inspect container: {e}")),
                    );
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(?summary, "workspace restore finished");
        Ok(summary)
    }

    async fn reprovision(&self, id: &WorkspaceId) {
        if let Err(e) = self.reset_workspace(id).await {
            tracing::error!(workspace_id = %id, error = %e, "failed to re-provision workspace");
        }
    }
}

#[cfg(test)]
#[path = "provision_tests.rs"]
mod tests;
