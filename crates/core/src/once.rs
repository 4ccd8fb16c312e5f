// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot guard for idempotent teardown

use std::sync::atomic::{AtomicBool, Ordering};

/// Lets exactly one caller through, no matter how many race for it.
#[derive(Debug, Default)]
pub struct OnceGuard {
    fired: AtomicBool,
}

impl OnceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` for the first caller only.
    pub fn try_fire(&self) -> bool {
        self.fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

#[cfg(test)]
#[path = "once_tests.rs"]
mod tests;
