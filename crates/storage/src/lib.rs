// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vibox-storage: keyed persistence of workspace records.
//!
//! Two stores share the [`WorkspaceStore`] contract: [`FileStore`] writes a
//! full JSON snapshot on every mutation, [`MemoryStore`] keeps records in
//! process memory only.

mod file;
mod memory;
mod records;
pub mod snapshot;
mod store;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use snapshot::{Snapshot, SnapshotError};
pub use store::{StoreError, WorkspaceStore};

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
