// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for orchestration identity types.

use super::*;

#[test]
fn new_instance_mints_execution_id() {
    let a = OrchestrationInstance::new("inst-1");
    let b = OrchestrationInstance::new("inst-1");
    assert_eq!(a.instance_id, "inst-1");
    assert!(!a.execution_id.is_empty());
    assert_ne!(a.execution_id, b.execution_id, "each generation gets its own execution id");
}

#[test]
fn next_generation_keeps_instance_id() {
    let first = OrchestrationInstance::new("inst-1");
    let second = first.next_generation();
    assert_eq!(second.instance_id, "inst-1");
    assert_ne!(second.execution_id, first.execution_id);
}

#[test]
fn random_instances_are_unique() {
    let a = OrchestrationInstance::random();
    let b = OrchestrationInstance::random();
    assert_ne!(a.instance_id, b.instance_id);
    assert!(a.instance_id.starts_with("dt-"));
}

#[test]
fn task_name_display_omits_empty_version() {
    assert_eq!(TaskName::new("Chain").to_string(), "Chain");
    assert_eq!(TaskName::versioned("Chain", "2").to_string(), "Chain@2");
}

#[test]
fn task_name_serde_omits_empty_version() {
    let json = serde_json::to_value(TaskName::new("Chain")).unwrap();
    assert_eq!(json, serde_json::json!({"name": "Chain"}));
}

#[test]
fn activity_dispatch_id_joins_instance_and_task() {
    assert_eq!(activity_dispatch_id("inst-1", 3), "inst-1.3");
}
