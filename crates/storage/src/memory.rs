// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::records::Records;
use crate::store::{StoreError, WorkspaceStore};
use parking_lot::RwLock;
use vibox_core::Workspace;

/// Workspace store that lives only in process memory.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Records>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkspaceStore for MemoryStore {
    fn create(&self, workspace: Workspace) -> Result<(), StoreError> {
        self.records.write().create(workspace, |_| Ok(()))
    }

    fn get(&self, id: &str) -> Result<Workspace, StoreError> {
        self.records.read().get(id)
    }

    fn list(&self) -> Result<Vec<Workspace>, StoreError> {
        Ok(self.records.read().list())
    }

    fn update(&self, workspace: Workspace) -> Result<(), StoreError> {
        self.records.write().update(workspace, |_| Ok(()))
    }

    fn delete(&self, id: &str) -> Result<Workspace, StoreError> {
        self.records.write().delete(id, |_| Ok(()))
    }
}
