// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One attached terminal: the exec streams, the client sink and the two pumps
//! moving data between them.

use super::transport::{TransportError, TransportSink, TransportSource};
use super::utf8::Utf8Chunker;
use super::{Registry, SessionInfo};
use chrono::{DateTime, Utc};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use vibox_adapters::ContainerEngine;
use vibox_core::{terminal_size, OnceGuard, SessionId, TerminalMessage};

/// Exec output read size.
const READ_BUFFER_SIZE: usize = 8192;

/// How long cleanup waits on a slow client for the close message.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

type ExecInput = Pin<Box<dyn AsyncWrite + Send>>;

pub(crate) struct Session {
    pub(crate) id: SessionId,
    pub(crate) container_id: String,
    pub(crate) exec_id: String,
    pub(crate) created_at: DateTime<Utc>,
    cancel: CancellationToken,
    cleaned_up: OnceGuard,
    closed: CancellationToken,
    input: AsyncMutex<Option<ExecInput>>,
    sink: AsyncMutex<Box<dyn TransportSink>>,
    registry: Registry,
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        container_id: String,
        exec_id: String,
        created_at: DateTime<Utc>,
        input: ExecInput,
        sink: Box<dyn TransportSink>,
        registry: Registry,
    ) -> Self {
        Self {
            id,
            container_id,
            exec_id,
            created_at,
            cancel: CancellationToken::new(),
            cleaned_up: OnceGuard::new(),
            closed: CancellationToken::new(),
            input: AsyncMutex::new(Some(input)),
            sink: AsyncMutex::new(sink),
            registry,
        }
    }

    pub(crate) fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            container_id: self.container_id.clone(),
            created_at: self.created_at,
        }
    }

    pub(crate) async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Tear the session down. Only the first call does the work; later
    /// calls wait for it to finish.
    pub(crate) async fn cleanup(&self) {
        if !self.cleaned_up.try_fire() {
            self.closed.cancelled().await;
            return;
        }
        self.cancel.cancel();

        if let Some(mut input) = self.input.lock().await.take() {
            if let Err(e) = input.shutdown().await {
                tracing::debug!(session_id = %self.id, error = %e, "exec stdin shutdown failed");
            }
        }

        let mut sink = self.sink.lock().await;
        match tokio::time::timeout(CLOSE_TIMEOUT, sink.send(TerminalMessage::close(""))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(session_id = %self.id, error = %e, "close message not delivered"),
            Err(_) => tracing::debug!(session_id = %self.id, "close message timed out"),
        }
        if tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await.is_err() {
            tracing::debug!(session_id = %self.id, "transport close timed out");
        }
        drop(sink);

        self.registry.lock().remove(&self.id);
        self.closed.cancel();
        tracing::info!(session_id = %self.id, container_id = %self.container_id, "terminal session closed");
    }

    /// Send to the client unless the session is being torn down.
    async fn send(&self, message: TerminalMessage) -> Result<(), TransportError> {
        let mut sink = tokio::select! {
            _ = self.cancel.cancelled() => return Err(TransportError::Closed),
            sink = self.sink.lock() => sink,
        };
        tokio::select! {
            _ = self.cancel.cancelled() => Err(TransportError::Closed),
            result = sink.send(message) => result,
        }
    }

    /// Write keystrokes to the exec's stdin.
    async fn write_input(&self, data: &[u8]) -> std::io::Result<()> {
        let mut guard = tokio::select! {
            _ = self.cancel.cancelled() => return Err(closed_stdin()),
            guard = self.input.lock() => guard,
        };
        let Some(input) = guard.as_mut() else {
            return Err(closed_stdin());
        };
        tokio::select! {
            _ = self.cancel.cancelled() => Err(closed_stdin()),
            result = async {
                input.write_all(data).await?;
                input.flush().await
            } => result,
        }
    }
}

fn closed_stdin() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::BrokenPipe, "exec stdin closed")
}

/// Client to exec: keystrokes and resizes.
pub(crate) async fn inbound_pump(
    session: Arc<Session>,
    mut source: Box<dyn TransportSource>,
    engine: Arc<dyn ContainerEngine>,
) {
    loop {
        let next = tokio::select! {
            _ = session.cancelled() => break,
            next = source.recv() => next,
        };
        let message = match next {
            None => {
                tracing::debug!(session_id = %session.id, "terminal client disconnected");
                break;
            }
            Some(Err(TransportError::Malformed(e))) => {
                tracing::warn!(session_id = %session.id, error = %e, "ignoring malformed terminal message");
                continue;
            }
            Some(Err(e)) => {
                tracing::warn!(session_id = %session.id, error = %e, "terminal client read failed");
                break;
            }
            Some(Ok(message)) => message,
        };

        match message {
            TerminalMessage::Input { data } => {
                if let Err(e) = session.write_input(data.as_bytes()).await {
                    if !session.cancel.is_cancelled() {
                        tracing::error!(session_id = %session.id, error = %e, "failed to write to exec");
                        let _ = session
                            .send(TerminalMessage::error("failed to send input to container"))
                            .await;
                    }
                    break;
                }
            }
            TerminalMessage::Resize { cols, rows } => match terminal_size(cols, rows) {
                Some((cols, rows)) => {
                    if let Err(e) = engine.resize_exec(&session.exec_id, cols, rows).await {
                        tracing::warn!(session_id = %session.id, error = %e, "failed to resize terminal");
                    }
                }
                None => tracing::debug!(session_id = %session.id, cols, rows, "ignoring invalid resize"),
            },
            other => {
                tracing::warn!(session_id = %session.id, kind = other.kind(), "ignoring unexpected terminal message")
            }
        }
    }
    session.cleanup().await;
}

/// Exec to client: shell output as text.
pub(crate) async fn outbound_pump(session: Arc<Session>, mut output: Pin<Box<dyn AsyncRead + Send>>) {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut chunker = Utf8Chunker::default();
    loop {
        let read = tokio::select! {
            _ = session.cancelled() => break,
            read = output.read(&mut buf) => read,
        };
        let n = match read {
            Ok(0) => {
                tracing::debug!(session_id = %session.id, "exec output ended");
                let rest = chunker.finish();
                if !rest.is_empty() {
                    let _ = session.send(TerminalMessage::output(rest)).await;
                }
                break;
            }
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(session_id = %session.id, error = %e, "failed to read from exec");
                break;
            }
        };

        let text = chunker.push(&buf[..n]);
        if text.is_empty() {
            continue;
        }
        if let Err(e) = session.send(TerminalMessage::output(text)).await {
            tracing::debug!(session_id = %session.id, error = %e, "failed to send terminal output");
            break;
        }
    }
    session.cleanup().await;
}
