// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::history::{EventKind, HistoryEvent};
use crate::instance::{OrchestrationInstance, TaskName};
use crate::message::TaskMessage;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::Value;

/// Fixed timestamp for reproducible events.
pub fn test_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
}

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for data-model types, used by wire round-trip tests.
pub mod strategies {
    use super::*;
    use crate::failure::TaskFailureDetails;
    use crate::status::OrchestrationStatus;
    use proptest::prelude::*;

    pub fn arb_status() -> impl Strategy<Value = OrchestrationStatus> {
        prop_oneof![
            Just(OrchestrationStatus::Pending),
            Just(OrchestrationStatus::Running),
            Just(OrchestrationStatus::Suspended),
            Just(OrchestrationStatus::Completed),
            Just(OrchestrationStatus::Failed),
            Just(OrchestrationStatus::Terminated),
            Just(OrchestrationStatus::Canceled),
            Just(OrchestrationStatus::ContinuedAsNew),
        ]
    }

    pub fn arb_failure() -> impl Strategy<Value = TaskFailureDetails> {
        ("[A-Za-z]{1,16}", ".{0,32}", any::<bool>()).prop_map(|(ty, msg, non_retriable)| {
            TaskFailureDetails { is_non_retriable: non_retriable, ..TaskFailureDetails::new(ty, msg) }
        })
    }

    pub fn arb_input() -> impl Strategy<Value = Option<serde_json::Value>> {
        prop_oneof![
            Just(None),
            any::<i64>().prop_map(|n| Some(serde_json::Value::from(n))),
            ".{0,16}".prop_map(|s| Some(serde_json::Value::from(s))),
        ]
    }

    pub fn arb_event_kind() -> impl Strategy<Value = EventKind> {
        prop_oneof![
            Just(EventKind::OrchestratorStarted),
            Just(EventKind::OrchestratorCompleted),
            ("[a-z]{1,12}", arb_input()).prop_map(|(name, input)| EventKind::ExecutionStarted {
                name: TaskName::new(name),
                input,
                parent: None,
                tags: IndexMap::new(),
                scheduled_start_time: None,
            }),
            (arb_status(), arb_input()).prop_map(|(status, result)| {
                EventKind::ExecutionCompleted { status, result, failure: None }
            }),
            ("[a-z]{1,12}", arb_input())
                .prop_map(|(name, input)| EventKind::TaskScheduled { name: TaskName::new(name), input }),
            (0..64i32, arb_input())
                .prop_map(|(id, result)| EventKind::TaskCompleted { scheduled_id: id, result }),
            (0..64i32, arb_failure())
                .prop_map(|(id, failure)| EventKind::TaskFailed { scheduled_id: id, failure }),
            ("[a-z]{1,12}", arb_input())
                .prop_map(|(name, input)| EventKind::EventRaised { name, input }),
        ]
    }
}

// ── Event factory functions ─────────────────────────────────────────────────

pub fn start_event(name: &str, input: Option<Value>) -> HistoryEvent {
    HistoryEvent::system(
        test_time(),
        EventKind::ExecutionStarted {
            name: TaskName::new(name),
            input,
            parent: None,
            tags: IndexMap::new(),
            scheduled_start_time: None,
        },
    )
}

pub fn start_message(instance_id: &str, name: &str, input: Option<Value>) -> TaskMessage {
    TaskMessage::new(OrchestrationInstance::new(instance_id), start_event(name, input))
}

pub fn task_scheduled_event(event_id: i32, name: &str) -> HistoryEvent {
    HistoryEvent::new(
        event_id,
        test_time(),
        EventKind::TaskScheduled { name: TaskName::new(name), input: None },
    )
}

pub fn task_completed_event(scheduled_id: i32, result: Option<Value>) -> HistoryEvent {
    HistoryEvent::system(test_time(), EventKind::TaskCompleted { scheduled_id, result })
}

pub fn event_raised(name: &str, input: Option<Value>) -> HistoryEvent {
    HistoryEvent::system(test_time(), EventKind::EventRaised { name: name.to_string(), input })
}
