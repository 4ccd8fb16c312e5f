// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vibox-core: shared types for the ViBox workspace gateway

pub mod macros;

pub mod clock;
pub mod id;
pub mod once;
pub mod terminal;
pub mod workspace;

pub use clock::{Clock, FakeClock, SystemClock};
pub use once::OnceGuard;
pub use terminal::{terminal_size, SessionId, TerminalMessage};
#[cfg(any(test, feature = "test-support"))]
pub use workspace::WorkspaceBuilder;
pub use workspace::{Script, Workspace, WorkspaceConfig, WorkspaceId, WorkspaceStatus};
