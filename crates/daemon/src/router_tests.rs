// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the per-instance message router.

use super::*;
use dt_core::test_support::start_message;

fn envelope(id: &str) -> WorkMessage {
    WorkMessage::for_instance(start_message(id, "Chain", None))
}

#[test]
fn deliver_without_dispatcher_returns_false() {
    let router = MessageRouter::new();
    assert!(!router.deliver("inst-1", envelope("inst-1")));
}

#[test]
fn initialize_seeds_and_registers() {
    let router = MessageRouter::new();
    let mut rx = router.initialize(envelope("inst-1")).unwrap();

    assert!(router.is_registered("inst-1"));
    assert_eq!(rx.try_recv().unwrap().dispatch_id, "inst-1");

    assert!(router.deliver("inst-1", envelope("inst-1")));
    assert!(rx.try_recv().is_ok());
}

#[test]
fn double_initialize_fails() {
    let router = MessageRouter::new();
    let _rx = router.initialize(envelope("inst-1")).unwrap();
    assert!(matches!(
        router.initialize(envelope("inst-1")),
        Err(RouterError::AlreadyRegistered(_))
    ));
}

#[test]
fn remove_unregisters() {
    let router = MessageRouter::new();
    let _rx = router.initialize(envelope("inst-1")).unwrap();
    router.remove("inst-1");
    assert!(!router.is_registered("inst-1"));
    assert!(!router.deliver("inst-1", envelope("inst-1")));
}

#[test]
fn instances_are_independent() {
    let router = MessageRouter::new();
    let _a = router.initialize(envelope("inst-a")).unwrap();
    let mut b = router.initialize(envelope("inst-b")).unwrap();

    assert!(router.deliver("inst-b", envelope("inst-b")));
    b.try_recv().unwrap();
    b.try_recv().unwrap();
    assert!(b.try_recv().is_err());
}
