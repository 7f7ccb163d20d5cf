// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for task message addressing and deferred visibility.

use super::*;
use crate::test_support::{start_message, test_time};
use chrono::Duration;

#[test]
fn for_instance_routes_by_instance_id() {
    let msg = start_message("inst-1", "Chain", None);
    let envelope = WorkMessage::for_instance(msg);
    assert_eq!(envelope.dispatch_id, "inst-1");
    assert!(envelope.parent.is_none());
    assert!(envelope.pop_receipt.is_none());
}

#[test]
fn timer_fired_is_deferred_until_fire_at() {
    let fire_at = test_time() + Duration::seconds(30);
    let msg = TaskMessage::new(
        OrchestrationInstance::new("inst-1"),
        HistoryEvent::system(test_time(), EventKind::TimerFired { scheduled_id: 0, fire_at }),
    );
    assert_eq!(msg.visible_at(), Some(fire_at));
}

#[test]
fn scheduled_start_defers_execution_started() {
    let start_at = test_time() + Duration::minutes(5);
    let mut msg = start_message("inst-1", "Chain", None);
    if let EventKind::ExecutionStarted { scheduled_start_time, .. } = &mut msg.event.kind {
        *scheduled_start_time = Some(start_at);
    }
    assert_eq!(msg.visible_at(), Some(start_at));
    assert!(msg.is_start());
}

#[test]
fn immediate_messages_have_no_visibility_delay() {
    let msg = start_message("inst-1", "Chain", None);
    assert_eq!(msg.visible_at(), None);
}
