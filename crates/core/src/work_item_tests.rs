// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for work item envelopes.

use super::*;

#[test]
fn activity_dispatch_id_matches_routing_convention() {
    let wi = ActivityWorkItem {
        instance: OrchestrationInstance::new("inst-1"),
        name: TaskName::new("Inc"),
        task_id: 4,
        input: None,
        lock_token: "tok".into(),
    };
    assert_eq!(wi.dispatch_id(), "inst-1.4");
}

#[test]
fn orchestrator_work_item_serde_round_trip() {
    let wi = OrchestratorWorkItem {
        instance: OrchestrationInstance::new("inst-1"),
        name: TaskName::new("Chain"),
        parent: None,
        replay_history: Vec::new(),
        new_messages: Vec::new(),
        metadata: IndexMap::new(),
        lock_token: "tok".into(),
        lock_expires_at: None,
    };
    let json = serde_json::to_string(&wi).unwrap();
    let back: OrchestratorWorkItem = serde_json::from_str(&json).unwrap();
    assert_eq!(back, wi);
}
