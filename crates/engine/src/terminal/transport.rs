// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client connection seam for terminal sessions.
//!
//! The gateway adapts its websocket to these traits; tests use channels.

use async_trait::async_trait;
use thiserror::Error;
use vibox_core::TerminalMessage;

#[derive(Debug, Error)]
pub enum TransportError {
    /// A frame arrived that is not a terminal message. The connection is
    /// still usable.
    #[error("malformed terminal message: {0}")]
    Malformed(String),
    #[error("terminal connection closed")]
    Closed,
    #[error("terminal connection error: {0}")]
    Io(String),
}

/// Inbound half: messages from the client.
#[async_trait]
pub trait TransportSource: Send + 'static {
    /// Next message, or `None` once the client has gone away.
    async fn recv(&mut self) -> Option<Result<TerminalMessage, TransportError>>;
}

/// Outbound half: messages to the client.
#[async_trait]
pub trait TransportSink: Send + 'static {
    async fn send(&mut self, message: TerminalMessage) -> Result<(), TransportError>;

    /// Close the connection. Errors are swallowed; the peer may be gone.
    async fn close(&mut self);
}

/// Both halves of one client connection.
pub struct Transport {
    pub source: Box<dyn TransportSource>,
    pub sink: Box<dyn TransportSink>,
}

impl Transport {
    pub fn new(source: impl TransportSource, sink: impl TransportSink) -> Self {
        Self {
            source: Box::new(source),
            sink: Box::new(sink),
        }
    }
}
