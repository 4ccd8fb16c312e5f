// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_does_not_go_backwards() {
    let clock = SystemClock;
    let t1 = clock.now();
    std::thread::sleep(Duration::from_millis(1));
    let t2 = clock.now();
    assert!(t2 >= t1);
}

#[test]
fn fake_clock_can_be_advanced() {
    let clock = FakeClock::new();
    let t1 = clock.now();
    clock.advance(Duration::from_secs(60));
    assert_eq!(clock.now() - t1, chrono::Duration::seconds(60));
}

#[test]
fn fake_clock_is_cloneable_and_shared() {
    let clock1 = FakeClock::new();
    let clock2 = clock1.clone();
    let t1 = clock1.now();
    clock2.advance(Duration::from_secs(30));
    assert_eq!(clock1.now() - t1, chrono::Duration::seconds(30));
}

#[test]
fn fake_clock_set_and_epoch_ms() {
    let clock = FakeClock::default();
    let target = Utc.timestamp_millis_opt(2_000_000_000_000).unwrap();
    clock.set(target);
    assert_eq!(clock.now(), target);
    assert_eq!(clock.epoch_ms(), 2_000_000_000_000);
}
