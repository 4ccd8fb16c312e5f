// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Contract suite run against every store implementation.

use super::*;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;
use vibox_core::{Workspace, WorkspaceStatus};

#[derive(Clone, Copy, Debug)]
enum Kind {
    Memory,
    File,
}

/// Store under test plus the tempdir keeping its snapshot alive.
fn open(kind: Kind) -> (Arc<dyn WorkspaceStore>, Option<TempDir>) {
    match kind {
        Kind::Memory => (Arc::new(MemoryStore::new()), None),
        Kind::File => {
            let dir = tempfile::tempdir().unwrap();
            let store = FileStore::open(dir.path().join("workspaces.json")).unwrap();
            (Arc::new(store), Some(dir))
        }
    }
}

fn workspace(id: &str, created_ms: i64) -> Workspace {
    let at = Utc.timestamp_millis_opt(created_ms).unwrap();
    Workspace::builder()
        .id(id)
        .name(format!("name-{id}"))
        .created_at(at)
        .updated_at(at)
        .build()
}

#[yare::parameterized(memory = { Kind::Memory }, file = { Kind::File })]
fn create_then_get(kind: Kind) {
    let (store, _dir) = open(kind);
    let ws = workspace("ws-1", 1);
    store.create(ws.clone()).unwrap();
    assert_eq!(store.get("ws-1").unwrap(), ws);
}

#[yare::parameterized(memory = { Kind::Memory }, file = { Kind::File })]
fn duplicate_create_fails_and_keeps_original(kind: Kind) {
    let (store, _dir) = open(kind);
    let original = workspace("ws-1", 1);
    store.create(original.clone()).unwrap();

    let mut dup = workspace("ws-1", 2);
    dup.name = "other".to_string();
    let err = store.create(dup).unwrap_err();

    assert!(matches!(err, StoreError::AlreadyExists(id) if id == "ws-1"));
    assert_eq!(store.get("ws-1").unwrap(), original);
}

#[yare::parameterized(memory = { Kind::Memory }, file = { Kind::File })]
fn create_rejects_empty_id(kind: Kind) {
    let (store, _dir) = open(kind);
    let err = store.create(workspace("", 1)).unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));
    assert!(store.list().unwrap().is_empty());
}

#[yare::parameterized(memory = { Kind::Memory }, file = { Kind::File })]
fn absent_id_is_not_found(kind: Kind) {
    let (store, _dir) = open(kind);
    assert!(matches!(store.get("ws-x"), Err(StoreError::NotFound(_))));
    assert!(matches!(store.update(workspace("ws-x", 1)), Err(StoreError::NotFound(_))));
    assert!(matches!(store.delete("ws-x"), Err(StoreError::NotFound(_))));
}

#[yare::parameterized(memory = { Kind::Memory }, file = { Kind::File })]
fn update_replaces_record(kind: Kind) {
    let (store, _dir) = open(kind);
    let mut ws = workspace("ws-1", 1);
    store.create(ws.clone()).unwrap();

    ws.status = WorkspaceStatus::Running;
    ws.container_id = Some("c-1".to_string());
    store.update(ws.clone()).unwrap();

    assert_eq!(store.get("ws-1").unwrap(), ws);
}

#[yare::parameterized(memory = { Kind::Memory }, file = { Kind::File })]
fn delete_returns_record_and_removes_it(kind: Kind) {
    let (store, _dir) = open(kind);
    let ws = workspace("ws-1", 1);
    store.create(ws.clone()).unwrap();

    assert_eq!(store.delete("ws-1").unwrap(), ws);
    assert!(matches!(store.get("ws-1"), Err(StoreError::NotFound(_))));
    assert!(store.list().unwrap().is_empty());
}

#[yare::parameterized(memory = { Kind::Memory }, file = { Kind::File })]
fn list_is_ordered_by_creation(kind: Kind) {
    let (store, _dir) = open(kind);
    store.create(workspace("ws-c", 30)).unwrap();
    store.create(workspace("ws-a", 10)).unwrap();
    store.create(workspace("ws-b", 20)).unwrap();

    let ids: Vec<String> = store
        .list()
        .unwrap()
        .into_iter()
        .map(|w| w.id.to_string())
        .collect();
    assert_eq!(ids, vec!["ws-a", "ws-b", "ws-c"]);
}

#[yare::parameterized(memory = { Kind::Memory }, file = { Kind::File })]
fn concurrent_creates_all_land(kind: Kind) {
    let (store, _dir) = open(kind);
    let handles: Vec<_> = (0..16)
        .map(|i| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || store.create(workspace(&format!("ws-{i}"), i)))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }
    assert_eq!(store.list().unwrap().len(), 16);
}
