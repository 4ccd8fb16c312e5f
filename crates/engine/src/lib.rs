// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vibox-engine: workspace orchestration, terminals and port forwarding

pub mod orchestrator;
pub mod proxy;
pub mod scripts;
pub mod terminal;

#[cfg(test)]
mod test_helpers;

pub use orchestrator::{
    container_name, CreateWorkspaceRequest, Orchestrator, OrchestratorConfig, OrchestratorError,
    RestoreSummary, WorkspaceResolver, DEFAULT_IMAGE,
};
pub use proxy::{ForwardRequest, ProxyBody, ProxyConfig, ProxyError, ProxyRouter};
pub use scripts::ScriptError;
pub use terminal::{
    SessionInfo, TerminalBridge, TerminalError, Transport, TransportError, TransportSink,
    TransportSource,
};
