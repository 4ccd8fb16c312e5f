// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interactive terminals attached to workspace containers.
//!
//! # Module layout
//!
//! - [`transport`]: client connection traits
//! - `session`: per-session state, pumps and cleanup
//! - `utf8`: output chunk decoding
//!
//! A session runs two pumps. The inbound pump forwards client keystrokes and
//! resizes to the exec; the outbound pump forwards exec output to the client.
//! Whichever side ends first triggers cleanup, which cancels the other.

mod session;
pub mod transport;
mod utf8;

pub use transport::{Transport, TransportError, TransportSink, TransportSource};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use session::Session;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use vibox_adapters::{ContainerEngine, EngineError, ExecSession};
use vibox_core::{Clock, SessionId, SystemClock, TerminalMessage};

/// Preferred interactive shell.
pub const PREFERRED_SHELL: &str = "/bin/bash";

/// Shell used when the preferred one is missing.
pub const FALLBACK_SHELL: &str = "/bin/sh";

#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("terminal session not found: {0}")]
    NotFound(String),
    #[error("container is not running: {0}")]
    PreconditionFailed(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Read-only view of an active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: SessionId,
    pub container_id: String,
    pub created_at: DateTime<Utc>,
}

pub(crate) type Registry = Arc<Mutex<HashMap<SessionId, Arc<Session>>>>;

/// Owns every active terminal session.
pub struct TerminalBridge<C: Clock = SystemClock> {
    engine: Arc<dyn ContainerEngine>,
    sessions: Registry,
    clock: C,
}

impl<C: Clock> Clone for TerminalBridge<C> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            sessions: Arc::clone(&self.sessions),
            clock: self.clock.clone(),
        }
    }
}

impl<C: Clock> TerminalBridge<C> {
    pub fn new(engine: Arc<dyn ContainerEngine>, clock: C) -> Self {
        Self {
            engine,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    /// Attach `transport` to a new shell in `container_id` and run until the
    /// session ends.
    ///
    /// Failures before the session starts are reported to the client as an
    /// `error` message, then the transport is closed.
    pub async fn create_session(
        &self,
        transport: Transport,
        container_id: &str,
    ) -> Result<(), TerminalError> {
        let Transport { source, mut sink } = transport;

        let exec = match self.start_shell(container_id).await {
            Ok(exec) => exec,
            Err(e) => {
                tracing::warn!(%container_id, error = %e, "terminal session rejected");
                if let Err(send_err) = sink.send(TerminalMessage::error(e.to_string())).await {
                    tracing::debug!(%container_id, error = %send_err, "failed to report terminal error");
                }
                sink.close().await;
                return Err(e);
            }
        };

        let id = SessionId::new();
        let session = Arc::new(Session::new(
            id.clone(),
            container_id.to_string(),
            exec.exec_id,
            self.clock.now(),
            exec.input,
            sink,
            Arc::clone(&self.sessions),
        ));
        self.sessions.lock().insert(id.clone(), Arc::clone(&session));
        tracing::info!(session_id = %id, %container_id, exec_id = %session.exec_id, "terminal session started");

        let inbound = tokio::spawn(session::inbound_pump(
            Arc::clone(&session),
            source,
            Arc::clone(&self.engine),
        ));
        let outbound = tokio::spawn(session::outbound_pump(Arc::clone(&session), exec.output));

        session.cancelled().await;
        for (pump, handle) in [("inbound", inbound), ("outbound", outbound)] {
            if let Err(e) = handle.await {
                tracing::error!(session_id = %id, pump, error = %e, "terminal pump panicked");
            }
        }
        // A panicked pump never ran cleanup.
        session.cleanup().await;
        Ok(())
    }

    /// Close one session. Returns once it is torn down.
    pub async fn close_session(&self, id: &str) -> Result<(), TerminalError> {
        let session = self
            .sessions
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| TerminalError::NotFound(id.to_string()))?;
        session.cleanup().await;
        Ok(())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Active sessions, oldest first.
    pub fn sessions(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<SessionInfo> = self.sessions.lock().values().map(|s| s.info()).collect();
        infos.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        infos
    }

    /// Close every session, e.g. on shutdown.
    pub async fn close_all(&self) {
        let sessions: Vec<Arc<Session>> = self.sessions.lock().values().cloned().collect();
        if sessions.is_empty() {
            return;
        }
        tracing::info!(count = sessions.len(), "closing terminal sessions");
        futures_util::future::join_all(sessions.iter().map(|s| s.cleanup())).await;
    }

    async fn start_shell(&self, container_id: &str) -> Result<ExecSession, TerminalError> {
        let status = self.engine.inspect_status(container_id).await?;
        if !status.is_running() {
            return Err(TerminalError::PreconditionFailed(format!(
                "{container_id} is {status}"
            )));
        }
        let shell = self.detect_shell(container_id).await;
        tracing::debug!(%container_id, shell, "starting terminal shell");
        Ok(self
            .engine
            .exec_interactive(container_id, &[shell.to_string()])
            .await?)
    }

    async fn detect_shell(&self, container_id: &str) -> &'static str {
        let detect = [
            FALLBACK_SHELL.to_string(),
            "-c".to_string(),
            "command -v bash".to_string(),
        ];
        match self.engine.exec_once(container_id, &detect).await {
            Ok(output) if output.success() => PREFERRED_SHELL,
            Ok(_) => FALLBACK_SHELL,
            Err(e) => {
                tracing::debug!(%container_id, error = %e, "shell detection failed, using fallback");
                FALLBACK_SHELL
            }
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
