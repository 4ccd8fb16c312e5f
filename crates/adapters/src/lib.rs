// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vibox-adapters: container engine integration

pub mod engine;

pub use engine::{
    ContainerEngine, ContainerSpec, ContainerStatus, DockerEngine, EngineError, ExecOutput,
    ExecSession,
};

#[cfg(any(test, feature = "test-support"))]
pub use engine::{EngineCall, EngineOp, FakeEngine, FakeTerminal};
