// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ViBox gateway daemon
//!
//! Configuration, startup lifecycle and the HTTP gateway around the
//! workspace orchestrator, terminal bridge and proxy router.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod env;
pub mod lifecycle;
pub mod listener;
pub mod logging;

pub use lifecycle::{startup, startup_with_engine, Config, ConfigError, DaemonState, LifecycleError, StartupResult};
pub use listener::{router, serve, AppState};
