// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal session identifiers and wire messages.
//!
//! Each message is one JSON object tagged by `type`:
//! `{"type":"input","data":"ls\n"}`, `{"type":"resize","cols":80,"rows":24}`.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for an attached terminal session.
    pub struct SessionId("ses-");
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TerminalMessage {
    /// Keystrokes from the client, written to the shell's stdin
    Input {
        #[serde(default)]
        data: String,
    },
    /// Shell output for the client
    Output { data: String },
    /// Client viewport change
    Resize {
        #[serde(default)]
        cols: i64,
        #[serde(default)]
        rows: i64,
    },
    Error { data: String },
    Close {
        #[serde(default, skip_serializing_if = "String::is_empty")]
        data: String,
    },
    /// Any `type` this gateway does not understand
    #[serde(other)]
    Unknown,
}

impl TerminalMessage {
    pub fn output(data: impl Into<String>) -> Self {
        Self::Output { data: data.into() }
    }

    pub fn error(data: impl Into<String>) -> Self {
        Self::Error { data: data.into() }
    }

    pub fn close(data: impl Into<String>) -> Self {
        Self::Close { data: data.into() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input { .. } => "input",
            Self::Output { .. } => "output",
            Self::Resize { .. } => "resize",
            Self::Error { .. } => "error",
            Self::Close { .. } => "close",
            Self::Unknown => "unknown",
        }
    }
}

/// Validated terminal dimensions.
///
/// Returns `None` unless both values are positive and fit a terminal size.
pub fn terminal_size(cols: i64, rows: i64) -> Option<(u16, u16)> {
    if cols <= 0 || rows <= 0 {
        return None;
    }
    Some((u16::try_from(cols).ok()?, u16::try_from(rows).ok()?))
}

#[cfg(test)]
#[path = "terminal_tests.rs"]
mod tests;
