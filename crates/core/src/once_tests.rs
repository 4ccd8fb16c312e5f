// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

#[test]
fn fires_once() {
    let guard = OnceGuard::new();
    assert!(!guard.has_fired());
    assert!(guard.try_fire());
    assert!(!guard.try_fire());
    assert!(guard.has_fired());
}

#[test]
fn concurrent_callers_get_one_winner() {
    let guard = Arc::new(OnceGuard::new());
    let winners = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let guard = Arc::clone(&guard);
            let winners = Arc::clone(&winners);
            std::thread::spawn(move || {
                if guard.try_fire() {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(winners.load(Ordering::SeqCst), 1);
}
