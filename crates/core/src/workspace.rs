// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace record and lifecycle status.
//!
//! A workspace is a named, container-backed development environment. The
//! record is the authoritative view; the container it references may have
//! disappeared out-of-band, so `container_id` is a hint, never a guarantee.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

crate::define_id! {
    /// Unique identifier for a workspace.
    pub struct WorkspaceId("ws-");
}

/// Status of a workspace in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceStatus {
    /// Record exists, container is being provisioned
    #[default]
    Creating,
    /// Container started and all setup scripts succeeded
    Running,
    /// Container was stopped outside the gateway
    Stopped,
    /// Provisioning or a later check failed; see `Workspace::error`
    Error,
}

crate::simple_display! {
    WorkspaceStatus {
        Creating => "creating",
        Running => "running",
        Stopped => "stopped",
        Error => "error",
    }
}

/// A setup script run once inside the container after it starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub order: i32,
}

impl Script {
    pub fn new(name: impl Into<String>, content: impl Into<String>, order: i32) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            order,
        }
    }
}

/// Provisioning inputs, kept on the record so the workspace can be rebuilt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scripts: Vec<Script>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exposed_ports: Vec<u16>,
}

impl WorkspaceConfig {
    /// Scripts in execution order: ascending `order`, ties keep their
    /// submission order.
    pub fn ordered_scripts(&self) -> Vec<Script> {
        let mut scripts = self.scripts.clone();
        scripts.sort_by_key(|s| s.order);
        scripts
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    pub status: WorkspaceStatus,
    pub config: WorkspaceConfig,
    /// Port number (as string) to a human label. Informational only.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ports: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workspace {
    /// A fresh record in `Creating` with no container yet.
    pub fn new(
        id: WorkspaceId,
        name: impl Into<String>,
        config: WorkspaceConfig,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            container_id: None,
            status: WorkspaceStatus::Creating,
            config,
            ports: BTreeMap::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set status and error together. The error is kept only for `Error`.
    pub fn set_status(&mut self, status: WorkspaceStatus, error: Option<String>, now: DateTime<Utc>) {
        self.status = status;
        self.error = match status {
            WorkspaceStatus::Error => error.filter(|e| !e.is_empty()),
            _ => None,
        };
        self.updated_at = now;
    }

    pub fn container_id(&self) -> Option<&str> {
        self.container_id.as_deref().filter(|c| !c.is_empty())
    }

    pub fn is_running(&self) -> bool {
        self.status == WorkspaceStatus::Running
    }
}

crate::builder! {
    pub struct WorkspaceBuilder => Workspace {
        into {
            id: WorkspaceId = WorkspaceId::new(),
            name: String = "test-workspace",
        }
        set {
            status: WorkspaceStatus = WorkspaceStatus::Creating,
            config: WorkspaceConfig = WorkspaceConfig {
                image: "ubuntu:22.04".to_string(),
                ..WorkspaceConfig::default()
            },
            ports: BTreeMap<String, String> = BTreeMap::new(),
            created_at: DateTime<Utc> = DateTime::<Utc>::default(),
            updated_at: DateTime<Utc> = DateTime::<Utc>::default(),
        }
        option {
            container_id: String = None,
            error: String = None,
        }
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
