// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provisioning run bookkeeping.
//!
//! Each create or reset starts a new run for the workspace and supersedes
//! the previous one. Only the live run may write to the record.

use std::collections::HashMap;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use vibox_core::WorkspaceId;

/// One provisioning attempt for a workspace.
#[derive(Debug, Clone)]
pub(crate) struct ProvisionRun {
    generation: u64,
    cancel: CancellationToken,
    /// Cancelled once the run's task has returned
    done: CancellationToken,
}

impl ProvisionRun {
    pub(crate) fn is_superseded(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive `step` to completion, or give up with `None` once superseded.
    pub(crate) async fn or_superseded<F: Future>(&self, step: F) -> Option<F::Output> {
        tokio::select! {
            output = step => Some(output),
            () = self.cancel.cancelled() => None,
        }
    }

    /// Held by the run's task; marks the run done when dropped.
    pub(crate) fn done_guard(&self) -> tokio_util::sync::DropGuard {
        self.done.clone().drop_guard()
    }

    /// Ask the run to stop and wait until its task has returned.
    pub(crate) async fn stop(self) {
        self.cancel.cancel();
        self.done.cancelled().await;
    }
}

/// Live runs keyed by workspace.
#[derive(Debug, Default)]
pub(crate) struct Runs {
    live: HashMap<WorkspaceId, ProvisionRun>,
    next_generation: u64,
}

impl Runs {
    /// Register a new run for `id`, cancelling any run it replaces.
    pub(crate) fn start(&mut self, id: &WorkspaceId) -> ProvisionRun {
        self.next_generation += 1;
        let run = ProvisionRun {
            generation: self.next_generation,
            cancel: CancellationToken::new(),
            done: CancellationToken::new(),
        };
        if let Some(previous) = self.live.insert(id.clone(), run.clone()) {
            previous.cancel.cancel();
        }
        run
    }

    pub(crate) fn is_live(&self, id: &str, run: &ProvisionRun) -> bool {
        self.live
            .get(id)
            .is_some_and(|live| live.generation == run.generation)
    }

    pub(crate) fn has_live(&self, id: &str) -> bool {
        self.live.contains_key(id)
    }

    /// Take the live run for `id` out of the table.
    pub(crate) fn take(&mut self, id: &str) -> Option<ProvisionRun> {
        self.live.remove(id)
    }

    /// Drop `run` from the table if it is still the live one.
    pub(crate) fn finish(&mut self, id: &str, run: &ProvisionRun) {
        if self.is_live(id, run) {
            self.live.remove(id);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.live.len()
    }
}

#[cfg(test)]
#[path = "runs_tests.rs"]
mod tests;
