// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot-backed workspace store.

use crate::records::{RecordMap, Records};
use crate::snapshot::{self, rotate_bak_path};
use crate::store::{StoreError, WorkspaceStore};
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use vibox_core::Workspace;

/// Workspace store persisted as one JSON snapshot file.
///
/// Every mutation rewrites the whole snapshot while holding the write lock,
/// so the file on disk always matches a state the map has actually been in.
pub struct FileStore {
    path: PathBuf,
    records: RwLock<Records>,
}

impl FileStore {
    /// Open the store at `path`, loading any existing snapshot.
    ///
    /// A missing snapshot starts empty. An unreadable one is moved aside to
    /// a `.bak` file and the store starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                StoreError::Persistence(format!("create {}: {e}", parent.display()))
            })?;
        }

        let map = match snapshot::load(&path) {
            Ok(Some(snapshot)) => {
                tracing::info!(
                    path = %path.display(),
                    count = snapshot.workspaces.len(),
                    "loaded workspace snapshot"
                );
                snapshot.workspaces
            }
            Ok(None) => {
                tracing::info!(path = %path.display(), "no workspace snapshot, starting empty");
                RecordMap::new()
            }
            Err(e) => {
                let bak = rotate_bak_path(&path);
                tracing::warn!(
                    path = %path.display(),
                    backup = %bak.display(),
                    error = %e,
                    "corrupt workspace snapshot, moving aside and starting empty"
                );
                if let Err(e) = fs::rename(&path, &bak) {
                    tracing::warn!(error = %e, "failed to move corrupt snapshot aside");
                }
                RecordMap::new()
            }
        };

        Ok(Self {
            path,
            records: RwLock::new(Records::from_map(map)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> impl FnOnce(&RecordMap) -> Result<(), StoreError> + '_ {
        move |map| {
            snapshot::write(&self.path, map).map_err(|e| {
                tracing::error!(path = %self.path.display(), error = %e, "snapshot write failed");
                StoreError::Persistence(e.to_string())
            })
        }
    }
}

impl WorkspaceStore for FileStore {
    fn create(&self, workspace: Workspace) -> Result<(), StoreError> {
        self.records.write().create(workspace, self.persist())
    }

    fn get(&self, id: &str) -> Result<Workspace, StoreError> {
        self.records.read().get(id)
    }

    fn list(&self) -> Result<Vec<Workspace>, StoreError> {
        Ok(self.records.read().list())
    }

    fn update(&self, workspace: Workspace) -> Result<(), StoreError> {
        self.records.write().update(workspace, self.persist())
    }

    fn delete(&self, id: &str) -> Result<Workspace, StoreError> {
        self.records.write().delete(id, self.persist())
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
