// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

use crate::orchestrator::{CreateWorkspaceRequest, Orchestrator, OrchestratorConfig};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use vibox_adapters::FakeEngine;
use vibox_core::{FakeClock, Script, Workspace};
use vibox_storage::{MemoryStore, StoreError, WorkspaceStore};

/// Memory store whose next `n` updates fail with a persistence error.
#[derive(Default)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    failing_updates: AtomicUsize,
}

impl FlakyStore {
    pub(crate) fn fail_next_updates(&self, n: usize) {
        self.failing_updates.store(n, Ordering::SeqCst);
    }
}

impl WorkspaceStore for FlakyStore {
    fn create(&self, workspace: Workspace) -> Result<(), StoreError> {
        self.inner.create(workspace)
    }

    fn get(&self, id: &str) -> Result<Workspace, StoreError> {
        self.inner.get(id)
    }

    fn list(&self) -> Result<Vec<Workspace>, StoreError> {
        self.inner.list()
    }

    fn update(&self, workspace: Workspace) -> Result<(), StoreError> {
        let failing = self
            .failing_updates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Persistence("disk full".to_string()));
        }
        self.inner.update(workspace)
    }

    fn delete(&self, id: &str) -> Result<Workspace, StoreError> {
        self.inner.delete(id)
    }
}

pub(crate) struct TestContext {
    pub orchestrator: Orchestrator<FakeClock>,
    pub engine: FakeEngine,
    pub store: Arc<FlakyStore>,
    pub clock: FakeClock,
}

pub(crate) fn setup() -> TestContext {
    let engine = FakeEngine::new();
    let store = Arc::new(FlakyStore::default());
    let clock = FakeClock::new();
    let orchestrator = Orchestrator::new(
        Arc::clone(&store) as Arc<dyn WorkspaceStore>,
        Arc::new(engine.clone()),
        OrchestratorConfig::default(),
        clock.clone(),
    );
    TestContext {
        orchestrator,
        engine,
        store,
        clock,
    }
}

pub(crate) fn request(name: &str) -> CreateWorkspaceRequest {
    CreateWorkspaceRequest {
        name: name.to_string(),
        image: None,
        scripts: Vec::new(),
        exposed_ports: Vec::new(),
        ports: BTreeMap::new(),
    }
}

pub(crate) fn request_with_scripts(name: &str, scripts: Vec<Script>) -> CreateWorkspaceRequest {
    CreateWorkspaceRequest {
        scripts,
        ..request(name)
    }
}

/// Create a workspace and wait for provisioning to finish.
pub(crate) async fn create_running(ctx: &TestContext, name: &str) -> Workspace {
    let workspace = ctx
        .orchestrator
        .create_workspace(request(name))
        .unwrap();
    ctx.orchestrator.wait_idle().await;
    ctx.orchestrator.get_workspace(&workspace.id).unwrap()
}
