// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Apply-then-persist map shared by both stores.

use crate::store::StoreError;
use std::collections::BTreeMap;
use vibox_core::Workspace;

pub(crate) type RecordMap = BTreeMap<String, Workspace>;

/// In-memory records. Each mutation runs `persist` after applying the change
/// and undoes the change if `persist` fails.
#[derive(Debug, Default)]
pub(crate) struct Records {
    map: RecordMap,
}

impl Records {
    pub(crate) fn from_map(map: RecordMap) -> Self {
        Self { map }
    }

    pub(crate) fn get(&self, id: &str) -> Result<Workspace, StoreError> {
        self.map
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    pub(crate) fn list(&self) -> Vec<Workspace> {
        let mut all: Vec<Workspace> = self.map.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        all
    }

    pub(crate) fn create<P>(&mut self, workspace: Workspace, persist: P) -> Result<(), StoreError>
    where
        P: FnOnce(&RecordMap) -> Result<(), StoreError>,
    {
        if workspace.id.is_empty() {
            return Err(StoreError::InvalidArgument(
                "workspace id is required".to_string(),
            ));
        }
        let id = workspace.id.to_string();
        if self.map.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }

        self.map.insert(id.clone(), workspace);
        if let Err(e) = persist(&self.map) {
            self.map.remove(&id);
            return Err(e);
        }
        Ok(())
    }

    pub(crate) fn update<P>(&mut self, workspace: Workspace, persist: P) -> Result<(), StoreError>
    where
        P: FnOnce(&RecordMap) -> Result<(), StoreError>,
    {
        let id = workspace.id.to_string();
        let Some(slot) = self.map.get_mut(&id) else {
            return Err(StoreError::NotFound(id));
        };

        let previous = std::mem::replace(slot, workspace);
        if let Err(e) = persist(&self.map) {
            self.map.insert(id, previous);
            return Err(e);
        }
        Ok(())
    }

    pub(crate) fn delete<P>(&mut self, id: &str, persist: P) -> Result<Workspace, StoreError>
    where
        P: FnOnce(&RecordMap) -> Result<(), StoreError>,
    {
        let Some(removed) = self.map.remove(id) else {
            return Err(StoreError::NotFound(id.to_string()));
        };

        if let Err(e) = persist(&self.map) {
            self.map.insert(id.to_string(), removed);
            return Err(e);
        }
        Ok(removed)
    }
}
