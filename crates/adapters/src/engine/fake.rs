// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory container engine for tests.

use super::{ContainerEngine, ContainerSpec, ContainerStatus, EngineError, ExecOutput, ExecSession};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::DuplexStream;
use tokio::sync::Notify;

/// Buffer size of each in-memory exec pipe.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineOp {
    Create,
    Start,
    Stop,
    Remove,
    Inspect,
    Address,
    ExecInteractive,
    Resize,
    ExecOnce,
    Copy,
}

/// Recorded engine call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Create { name: String, image: String },
    Start { container_id: String },
    Stop { container_id: String },
    Remove { container_id: String },
    ExecInteractive { container_id: String, cmd: Vec<String> },
    Resize { exec_id: String, cols: u16, rows: u16 },
    ExecOnce { container_id: String, cmd: Vec<String> },
    Copy { container_id: String, path: String, content: Vec<u8> },
}

/// The container side of an interactive exec.
///
/// Bytes written to `remote` appear as exec output; bytes the gateway writes
/// to the exec's stdin can be read from `remote`. Dropping it ends the exec.
pub struct FakeTerminal {
    pub exec_id: String,
    pub container_id: String,
    pub cmd: Vec<String>,
    pub remote: DuplexStream,
}

struct FakeContainer {
    name: String,
    status: ContainerStatus,
    address: Option<String>,
    files: HashMap<String, Vec<u8>>,
}

#[derive(Default)]
struct FakeEngineState {
    containers: HashMap<String, FakeContainer>,
    calls: Vec<EngineCall>,
    failures: HashMap<EngineOp, String>,
    exec_rules: Vec<(String, ExecOutput)>,
    terminals: Vec<FakeTerminal>,
    start_gate: Option<Arc<Notify>>,
    next_id: u64,
}

/// Fake container engine for testing
#[derive(Clone, Default)]
pub struct FakeEngine {
    inner: Arc<Mutex<FakeEngineState>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<EngineCall> {
        self.inner.lock().calls.clone()
    }

    /// Commands passed to one-shot execs, in call order.
    pub fn exec_commands(&self) -> Vec<Vec<String>> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::ExecOnce { cmd, .. } => Some(cmd.clone()),
                _ => None,
            })
            .collect()
    }

    /// Make every future `op` fail with `message`.
    pub fn fail(&self, op: EngineOp, message: impl Into<String>) {
        self.inner.lock().failures.insert(op, message.into());
    }

    /// Stop failing `op`.
    pub fn succeed(&self, op: EngineOp) {
        self.inner.lock().failures.remove(&op);
    }

    /// One-shot execs whose joined command contains `pattern` return `output`.
    /// Later rules take precedence.
    pub fn on_exec(&self, pattern: impl Into<String>, output: ExecOutput) {
        self.inner.lock().exec_rules.push((pattern.into(), output));
    }

    /// Register a container that already exists in the engine.
    pub fn add_container(&self, container_id: &str, name: &str, status: ContainerStatus) {
        self.inner.lock().containers.insert(
            container_id.to_string(),
            FakeContainer {
                name: name.to_string(),
                status,
                address: Some("127.0.0.1".to_string()),
                files: HashMap::new(),
            },
        );
    }

    pub fn set_status(&self, container_id: &str, status: ContainerStatus) {
        if let Some(c) = self.inner.lock().containers.get_mut(container_id) {
            c.status = status;
        }
    }

    pub fn set_address(&self, container_id: &str, address: Option<&str>) {
        if let Some(c) = self.inner.lock().containers.get_mut(container_id) {
            c.address = address.map(str::to_string);
        }
    }

    pub fn status(&self, container_id: &str) -> Option<ContainerStatus> {
        self.inner.lock().containers.get(container_id).map(|c| c.status)
    }

    pub fn container_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.lock().containers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Content written to `path` inside a container.
    pub fn file(&self, container_id: &str, path: &str) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .containers
            .get(container_id)
            .and_then(|c| c.files.get(path).cloned())
    }

    /// Hold every `start_container` until the returned gate is notified.
    pub fn gate_starts(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.inner.lock().start_gate = Some(Arc::clone(&gate));
        gate
    }

    /// Take the oldest unclaimed interactive exec.
    pub fn take_terminal(&self) -> Option<FakeTerminal> {
        let mut state = self.inner.lock();
        if state.terminals.is_empty() {
            None
        } else {
            Some(state.terminals.remove(0))
        }
    }

    fn check(&self, op: EngineOp) -> Result<(), EngineError> {
        match self.inner.lock().failures.get(&op) {
            Some(message) => Err(EngineError::Api(message.clone())),
            None => Ok(()),
        }
    }

    fn record(&self, call: EngineCall) {
        self.inner.lock().calls.push(call);
    }

    fn require_running(&self, container_id: &str) -> Result<(), EngineError> {
        match self.inner.lock().containers.get(container_id) {
            None => Err(EngineError::NotFound(container_id.to_string())),
            Some(c) if !c.status.is_running() => Err(EngineError::Api(format!(
                "container {container_id} is not running"
            ))),
            Some(_) => Ok(()),
        }
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, EngineError> {
        self.record(EngineCall::Create {
            name: spec.name.clone(),
            image: spec.image.clone(),
        });
        self.check(EngineOp::Create)?;

        let mut state = self.inner.lock();
        if state.containers.values().any(|c| c.name == spec.name) {
            return Err(EngineError::Api(format!(
                "conflict: container name {} is already in use",
                spec.name
            )));
        }
        state.next_id += 1;
        let id = format!("fake-{}", state.next_id);
        state.containers.insert(
            id.clone(),
            FakeContainer {
                name: spec.name.clone(),
                status: ContainerStatus::Created,
                address: Some("127.0.0.1".to_string()),
                files: HashMap::new(),
            },
        );
        Ok(id)
    }

    async fn start_container(&self, container_id: &str) -> Result<(), EngineError> {
        self.record(EngineCall::Start {
            container_id: container_id.to_string(),
        });
        let gate = self.inner.lock().start_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.check(EngineOp::Start)?;

        match self.inner.lock().containers.get_mut(container_id) {
            Some(c) => {
                c.status = ContainerStatus::Running;
                Ok(())
            }
            None => Err(EngineError::NotFound(container_id.to_string())),
        }
    }

    async fn stop_container(
        &self,
        container_id: &str,
        _timeout: Duration,
    ) -> Result<(), EngineError> {
        self.record(EngineCall::Stop {
            container_id: container_id.to_string(),
        });
        self.check(EngineOp::Stop)?;

        match self.inner.lock().containers.get_mut(container_id) {
            Some(c) => {
                c.status = ContainerStatus::Exited;
                Ok(())
            }
            None => Err(EngineError::NotFound(container_id.to_string())),
        }
    }

    async fn remove_container(&self, container_id: &str) -> Result<(), EngineError> {
        self.record(EngineCall::Remove {
            container_id: container_id.to_string(),
        });
        self.check(EngineOp::Remove)?;

        match self.inner.lock().containers.remove(container_id) {
            Some(_) => Ok(()),
            None => Err(EngineError::NotFound(container_id.to_string())),
        }
    }

    async fn inspect_status(&self, container_id: &str) -> Result<ContainerStatus, EngineError> {
        self.check(EngineOp::Inspect)?;
        self.status(container_id)
            .ok_or_else(|| EngineError::NotFound(container_id.to_string()))
    }

    async fn container_address(&self, container_id: &str) -> Result<String, EngineError> {
        self.check(EngineOp::Address)?;
        self.require_running(container_id)?;
        self.inner
            .lock()
            .containers
            .get(container_id)
            .and_then(|c| c.address.clone())
            .ok_or_else(|| EngineError::Api(format!("container {container_id} has no address")))
    }

    async fn exec_interactive(
        &self,
        container_id: &str,
        cmd: &[String],
    ) -> Result<ExecSession, EngineError> {
        self.record(EngineCall::ExecInteractive {
            container_id: container_id.to_string(),
            cmd: cmd.to_vec(),
        });
        self.check(EngineOp::ExecInteractive)?;
        self.require_running(container_id)?;

        let (local, remote) = tokio::io::duplex(PIPE_CAPACITY);
        let (output, input) = tokio::io::split(local);
        let mut state = self.inner.lock();
        state.next_id += 1;
        let exec_id = format!("exec-{}", state.next_id);
        state.terminals.push(FakeTerminal {
            exec_id: exec_id.clone(),
            container_id: container_id.to_string(),
            cmd: cmd.to_vec(),
            remote,
        });
        Ok(ExecSession {
            exec_id,
            output: Box::pin(output),
            input: Box::pin(input),
        })
    }

    async fn resize_exec(&self, exec_id: &str, cols: u16, rows: u16) -> Result<(), EngineError> {
        self.record(EngineCall::Resize {
            exec_id: exec_id.to_string(),
            cols,
            rows,
        });
        self.check(EngineOp::Resize)
    }

    async fn exec_once(
        &self,
        container_id: &str,
        cmd: &[String],
    ) -> Result<ExecOutput, EngineError> {
        self.record(EngineCall::ExecOnce {
            container_id: container_id.to_string(),
            cmd: cmd.to_vec(),
        });
        self.check(EngineOp::ExecOnce)?;
        self.require_running(container_id)?;

        let joined = cmd.join(" ");
        let state = self.inner.lock();
        let output = state
            .exec_rules
            .iter()
            .rev()
            .find(|(pattern, _)| joined.contains(pattern.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_default();
        Ok(output)
    }

    async fn copy_file(
        &self,
        container_id: &str,
        path: &str,
        content: &[u8],
    ) -> Result<(), EngineError> {
        self.record(EngineCall::Copy {
            container_id: container_id.to_string(),
            path: path.to_string(),
            content: content.to_vec(),
        });
        self.check(EngineOp::Copy)?;
        self.require_running(container_id)?;

        if let Some(c) = self.inner.lock().containers.get_mut(container_id) {
            c.files.insert(path.to_string(), content.to_vec());
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
