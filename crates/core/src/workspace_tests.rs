// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;

fn at(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).unwrap()
}

#[test]
fn workspace_ids_use_ws_prefix() {
    let id = WorkspaceId::new();
    assert!(id.as_str().starts_with("ws-"));
}

#[yare::parameterized(
    creating = { WorkspaceStatus::Creating, "creating" },
    running  = { WorkspaceStatus::Running, "running" },
    stopped  = { WorkspaceStatus::Stopped, "stopped" },
    error    = { WorkspaceStatus::Error, "error" },
)]
fn status_display_and_serde_agree(status: WorkspaceStatus, expected: &str) {
    assert_eq!(status.to_string(), expected);
    assert_eq!(serde_json::to_string(&status).unwrap(), format!("\"{expected}\""));
    let parsed: WorkspaceStatus = serde_json::from_str(&format!("\"{expected}\"")).unwrap();
    assert_eq!(parsed, status);
}

#[test]
fn new_workspace_starts_creating_without_container() {
    let config = WorkspaceConfig {
        image: "alpine:3".to_string(),
        ..WorkspaceConfig::default()
    };
    let ws = Workspace::new(WorkspaceId::from_string("ws-1"), "dev", config, at(1_000));

    assert_eq!(ws.status, WorkspaceStatus::Creating);
    assert_eq!(ws.container_id(), None);
    assert_eq!(ws.error, None);
    assert_eq!(ws.created_at, ws.updated_at);
    assert_eq!(ws.config.image, "alpine:3");
}

#[test]
fn set_status_keeps_error_only_for_error_status() {
    let mut ws = Workspace::builder().build();

    ws.set_status(WorkspaceStatus::Error, Some("boom".to_string()), at(5_000));
    assert_eq!(ws.error.as_deref(), Some("boom"));
    assert_eq!(ws.updated_at, at(5_000));

    ws.set_status(WorkspaceStatus::Running, Some("ignored".to_string()), at(6_000));
    assert_eq!(ws.error, None);
    assert!(ws.is_running());
    assert_eq!(ws.updated_at, at(6_000));
}

#[test]
fn empty_container_id_is_treated_as_absent() {
    let ws = Workspace::builder().container_id("").build();
    assert_eq!(ws.container_id(), None);

    let ws = Workspace::builder().container_id("abc123").build();
    assert_eq!(ws.container_id(), Some("abc123"));
}

#[test]
fn ordered_scripts_sorts_ascending_and_keeps_ties_stable() {
    let config = WorkspaceConfig {
        image: "img".to_string(),
        scripts: vec![
            Script::new("c", "", 3),
            Script::new("a1", "", 1),
            Script::new("b", "", 2),
            Script::new("a2", "", 1),
        ],
        exposed_ports: vec![],
    };

    let names: Vec<_> = config
        .ordered_scripts()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["a1", "a2", "b", "c"]);
}

#[test]
fn workspace_json_shape() {
    let mut ws = Workspace::builder()
        .id("ws-abc")
        .name("demo")
        .container_id("c1")
        .build();
    ws.ports.insert("8080".to_string(), "web".to_string());

    let value = serde_json::to_value(&ws).unwrap();
    assert_eq!(value["id"], "ws-abc");
    assert_eq!(value["name"], "demo");
    assert_eq!(value["container_id"], "c1");
    assert_eq!(value["status"], "creating");
    assert_eq!(value["config"]["image"], "ubuntu:22.04");
    assert_eq!(value["ports"]["8080"], "web");
    assert!(value.get("error").is_none());

    let back: Workspace = serde_json::from_value(value).unwrap();
    assert_eq!(back, ws);
}

#[test]
fn script_order_defaults_to_zero() {
    let script: Script = serde_json::from_str(r#"{"name":"s","content":"echo hi"}"#).unwrap();
    assert_eq!(script.order, 0);
}
