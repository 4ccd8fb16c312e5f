// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;
use vibox_core::Workspace;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("workspace not found: {0}")]
    NotFound(String),
    #[error("workspace already exists: {0}")]
    AlreadyExists(String),
    #[error("failed to persist workspaces: {0}")]
    Persistence(String),
}

/// Keyed storage of workspace records.
///
/// Mutations are all-or-nothing: if the change cannot be made durable the
/// store is left exactly as it was before the call.
pub trait WorkspaceStore: Send + Sync + 'static {
    /// Insert a new record. Fails with `AlreadyExists` if the id is taken.
    fn create(&self, workspace: Workspace) -> Result<(), StoreError>;

    fn get(&self, id: &str) -> Result<Workspace, StoreError>;

    /// All records, oldest first.
    fn list(&self) -> Result<Vec<Workspace>, StoreError>;

    /// Replace an existing record.
    fn update(&self, workspace: Workspace) -> Result<(), StoreError>;

    /// Remove a record, returning what was stored.
    fn delete(&self, id: &str) -> Result<Workspace, StoreError>;
}
