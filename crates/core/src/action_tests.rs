// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for orchestrator action envelopes.

use super::*;
use serde_json::json;

#[test]
fn serializes_with_action_tag() {
    let action = OrchestratorAction {
        id: 4,
        kind: ActionKind::ScheduleTask { name: TaskName::new("Inc"), input: Some(json!(1)) },
    };
    let json = serde_json::to_value(&action).unwrap();
    assert_eq!(json["action"], "schedule-task");
    assert_eq!(json["id"], 4);

    let back: OrchestratorAction = serde_json::from_value(json).unwrap();
    assert_eq!(back, action);
}

#[test]
fn completion_constructors_set_status() {
    assert_eq!(
        CompletionOutcome::completed(Some(json!(5))).status,
        OrchestrationStatus::Completed
    );
    let failed = CompletionOutcome::failed(TaskFailureDetails::new("E", "m"));
    assert_eq!(failed.status, OrchestrationStatus::Failed);
    assert!(failed.failure.is_some());
    assert_eq!(
        CompletionOutcome::terminated(Some(json!("stop"))).status,
        OrchestrationStatus::Terminated
    );
}

#[test]
fn continue_as_new_detection() {
    let outcome = CompletionOutcome::continued_as_new(Some(json!(2)), Vec::new());
    assert!(outcome.is_continue_as_new());
    assert!(!CompletionOutcome::completed(None).is_continue_as_new());
}
