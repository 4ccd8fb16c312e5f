// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{create_running, request, setup};
use std::collections::HashSet;
use std::time::Duration;
use vibox_adapters::{ContainerStatus, EngineOp};

#[tokio::test]
async fn create_returns_creating_record_with_default_image() {
    let ctx = setup();

    let workspace = ctx.orchestrator.create_workspace(request("dev")).unwrap();

    assert_eq!(workspace.status, WorkspaceStatus::Creating);
    assert_eq!(workspace.name, "dev");
    assert_eq!(workspace.config.image, DEFAULT_IMAGE);
    assert_eq!(workspace.container_id(), None);
    assert!(workspace.id.as_str().starts_with("ws-"));
    assert_eq!(ctx.orchestrator.get_workspace(&workspace.id).unwrap().id, workspace.id);
}

#[tokio::test]
async fn create_uses_requested_image() {
    let ctx = setup();
    let req = CreateWorkspaceRequest {
        image: Some("node:20".to_string()),
        ..request("web")
    };

    let workspace = ctx.orchestrator.create_workspace(req).unwrap();
    assert_eq!(workspace.config.image, "node:20");
}

#[yare::parameterized(
    empty_name   = { "", None, &[] },
    blank_name   = { "   ", None, &[] },
    zero_port    = { "ok", None, &[0] },
    bad_label    = { "ok", Some("http"), &[] },
)]
fn create_rejects_invalid_requests(name: &str, label_key: Option<&str>, exposed: &[u16]) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async {
        let ctx = setup();
        let mut req = request(name);
        req.exposed_ports = exposed.to_vec();
        if let Some(key) = label_key {
            req.ports.insert(key.to_string(), "web".to_string());
        }

        let err = ctx.orchestrator.create_workspace(req).unwrap_err();

        assert!(matches!(err, OrchestratorError::InvalidArgument(_)));
        assert!(ctx.orchestrator.list_workspaces().unwrap().is_empty());
        assert_eq!(ctx.orchestrator.pending_tasks(), 0);
    });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_get_distinct_ids() {
    let ctx = setup();

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let orchestrator = ctx.orchestrator.clone();
            tokio::spawn(async move { orchestrator.create_workspace(request(&format!("ws{i}"))) })
        })
        .collect();
    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.await.unwrap().unwrap().id);
    }
    ctx.orchestrator.wait_idle().await;

    assert_eq!(ids.len(), 20);
    assert_eq!(ctx.orchestrator.list_workspaces().unwrap().len(), 20);
}

#[tokio::test]
async fn get_unknown_is_not_found() {
    let ctx = setup();
    let err = ctx.orchestrator.get_workspace("ws-missing").unwrap_err();
    assert!(matches!(err, OrchestratorError::NotFound(id) if id == "ws-missing"));
}

#[tokio::test]
async fn delete_removes_container_and_record() {
    let ctx = setup();
    let workspace = create_running(&ctx, "dev").await;
    let container_id = workspace.container_id().unwrap().to_string();

    ctx.orchestrator.delete_workspace(&workspace.id).await.unwrap();

    assert!(ctx.engine.status(&container_id).is_none());
    assert!(ctx.orchestrator.list_workspaces().unwrap().is_empty());
}

#[tokio::test]
async fn delete_succeeds_when_container_removal_fails() {
    let ctx = setup();
    let workspace = create_running(&ctx, "dev").await;
    ctx.engine.fail(EngineOp::Remove, "engine unavailable");

    ctx.orchestrator.delete_workspace(&workspace.id).await.unwrap();

    assert!(ctx.orchestrator.list_workspaces().unwrap().is_empty());
    assert!(matches!(
        ctx.orchestrator.get_workspace(&workspace.id),
        Err(OrchestratorError::NotFound(_))
    ));
}

#[tokio::test]
async fn delete_unknown_is_not_found() {
    let ctx = setup();
    let err = ctx.orchestrator.delete_workspace("ws-nope").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::NotFound(_)));
}

#[tokio::test]
async fn update_ports_replaces_labels_and_bumps_timestamp() {
    let ctx = setup();
    let workspace = create_running(&ctx, "dev").await;
    ctx.clock.advance(Duration::from_secs(5));

    let ports = BTreeMap::from([
        ("3000".to_string(), "app".to_string()),
        ("5432".to_string(), "postgres".to_string()),
    ]);
    let updated = ctx.orchestrator.update_ports(&workspace.id, ports.clone()).unwrap();

    assert_eq!(updated.ports, ports);
    assert!(updated.updated_at > workspace.updated_at);
    assert_eq!(ctx.orchestrator.get_workspace(&workspace.id).unwrap().ports, ports);
}

#[tokio::test]
async fn update_ports_unknown_is_not_found() {
    let ctx = setup();
    let err = ctx
        .orchestrator
        .update_ports("ws-nope", BTreeMap::new())
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::NotFound(_)));
}

#[tokio::test]
async fn reset_replaces_container() {
    let ctx = setup();
    let workspace = create_running(&ctx, "dev").await;
    let old_container = workspace.container_id().unwrap().to_string();

    let reset = ctx.orchestrator.reset_workspace(&workspace.id).await.unwrap();
    assert_eq!(reset.status, WorkspaceStatus::Creating);
    assert_eq!(reset.container_id(), None);
    ctx.orchestrator.wait_idle().await;

    let after = ctx.orchestrator.get_workspace(&workspace.id).unwrap();
    assert_eq!(after.status, WorkspaceStatus::Running);
    let new_container = after.container_id().unwrap();
    assert_ne!(new_container, old_container);
    assert!(ctx.engine.status(&old_container).is_none());
    assert_eq!(ctx.engine.status(new_container), Some(ContainerStatus::Running));
}

#[tokio::test]
async fn reset_clears_previous_error() {
    let ctx = setup();
    ctx.engine.fail(EngineOp::Start, "boom");
    let workspace = create_running(&ctx, "dev").await;
    assert_eq!(workspace.status, WorkspaceStatus::Error);

    ctx.engine.succeed(EngineOp::Start);
    let reset = ctx.orchestrator.reset_workspace(&workspace.id).await.unwrap();
    assert_eq!(reset.error, None);
    ctx.orchestrator.wait_idle().await;

    let after = ctx.orchestrator.get_workspace(&workspace.id).unwrap();
    assert_eq!(after.status, WorkspaceStatus::Running);
    assert_eq!(after.error, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn port_edits_survive_concurrent_status_writes() {
    let ctx = setup();
    let workspace = create_running(&ctx, "dev").await;

    let labels = {
        let orchestrator = ctx.orchestrator.clone();
        let id = workspace.id.clone();
        tokio::spawn(async move {
            for i in 0..200 {
                let ports = BTreeMap::from([("8080".to_string(), format!("web-{i}"))]);
                orchestrator.update_ports(&id, ports).unwrap();
                tokio::task::yield_now().await;
            }
        })
    };
    let statuses = {
        let orchestrator = ctx.orchestrator.clone();
        let id = workspace.id.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                orchestrator.update_status(&id, WorkspaceStatus::Running, None);
                tokio::task::yield_now().await;
            }
        })
    };
    labels.await.unwrap();
    statuses.await.unwrap();

    let after = ctx.orchestrator.get_workspace(&workspace.id).unwrap();
    assert_eq!(after.ports.get("8080").map(String::as_str), Some("web-199"));
}

#[tokio::test]
async fn update_status_on_deleted_workspace_is_dropped() {
    let ctx = setup();
    let workspace = create_running(&ctx, "dev").await;
    ctx.orchestrator.delete_workspace(&workspace.id).await.unwrap();

    ctx.orchestrator
        .update_status(&workspace.id, WorkspaceStatus::Running, None);

    assert!(ctx.orchestrator.list_workspaces().unwrap().is_empty());
}

#[tokio::test]
async fn resolver_finds_workspaces() {
    let ctx = setup();
    let workspace = create_running(&ctx, "dev").await;
    let resolver: &dyn WorkspaceResolver = &ctx.orchestrator;

    assert_eq!(resolver.resolve(&workspace.id).unwrap().id, workspace.id);
    assert!(matches!(resolver.resolve("ws-x"), Err(OrchestratorError::NotFound(_))));
}

#[test]
fn container_name_uses_id_suffix() {
    let id = WorkspaceId::from_string("ws-abc123");
    assert_eq!(container_name(&id), "vibox-abc123");
}

#[test]
fn create_request_defaults_optional_fields() {
    let req: CreateWorkspaceRequest = serde_json::from_str(r#"{"name":"dev"}"#).unwrap();
    assert_eq!(req.name, "dev");
    assert_eq!(req.image, None);
    assert!(req.scripts.is_empty());
    assert!(req.ports.is_empty());
}
