// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the clock abstraction.

use super::*;

#[test]
fn fake_clock_starts_at_fixed_epoch() {
    let a = FakeClock::new();
    let b = FakeClock::new();
    assert_eq!(a.now_utc(), b.now_utc());
}

#[test]
fn advance_moves_time_forward() {
    let clock = FakeClock::new();
    let before = clock.now_utc();
    clock.advance(Duration::seconds(90));
    assert_eq!(clock.now_utc() - before, Duration::seconds(90));
}

#[test]
fn set_overrides_current_time() {
    let clock = FakeClock::new();
    let target = clock.now_utc() + Duration::days(1);
    clock.set(target);
    assert_eq!(clock.now_utc(), target);
}

#[test]
fn clones_share_time() {
    let clock = FakeClock::new();
    let other = clock.clone();
    clock.advance(Duration::seconds(5));
    assert_eq!(other.now_utc(), clock.now_utc());
}
