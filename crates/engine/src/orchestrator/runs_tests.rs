// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn new_run_supersedes_previous() {
    let mut runs = Runs::default();
    let id = WorkspaceId::from_string("ws-1");

    let first = runs.start(&id);
    let second = runs.start(&id);

    assert!(first.is_superseded());
    assert!(!second.is_superseded());
    assert!(!runs.is_live("ws-1", &first));
    assert!(runs.is_live("ws-1", &second));
    assert_eq!(runs.len(), 1);
}

#[test]
fn finishing_a_stale_run_keeps_the_live_one() {
    let mut runs = Runs::default();
    let id = WorkspaceId::from_string("ws-1");
    let first = runs.start(&id);
    let second = runs.start(&id);

    runs.finish("ws-1", &first);
    assert!(runs.is_live("ws-1", &second));

    runs.finish("ws-1", &second);
    assert!(!runs.has_live("ws-1"));
    assert_eq!(runs.len(), 0);
}

#[test]
fn runs_are_per_workspace() {
    let mut runs = Runs::default();
    let a = runs.start(&WorkspaceId::from_string("ws-a"));
    let b = runs.start(&WorkspaceId::from_string("ws-b"));

    assert!(runs.is_live("ws-a", &a));
    assert!(runs.is_live("ws-b", &b));
    assert!(!runs.is_live("ws-a", &b));
}

#[tokio::test]
async fn stop_waits_for_the_task_to_return() {
    let mut runs = Runs::default();
    let run = runs.start(&WorkspaceId::from_string("ws-1"));
    let (tx, rx) = tokio::sync::oneshot::channel();

    let task_run = run.clone();
    tokio::spawn(async move {
        let _done = task_run.done_guard();
        let outcome = task_run.or_superseded(std::future::pending::<()>()).await;
        let _ = tx.send(outcome);
    });

    runs.take("ws-1").unwrap().stop().await;

    assert_eq!(rx.await.unwrap(), None);
    assert!(run.is_superseded());
}
