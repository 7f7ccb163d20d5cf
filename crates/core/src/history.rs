// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! History events: the durable record of everything an orchestration did.
//!
//! Serializes with `{"id": n, "timestamp": ..., "type": "task:scheduled", ...fields}`
//! format. Event ids are assigned by the orchestration cursor (`>= 0`) or
//! are system-synthesized (`-1`).

use crate::failure::TaskFailureDetails;
use crate::instance::{ParentInfo, TaskName};
use crate::status::OrchestrationStatus;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event id used for events not assigned by the orchestrator cursor.
pub const SYSTEM_EVENT_ID: i32 = -1;

/// One entry in an orchestration's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    #[serde(rename = "id")]
    pub event_id: i32,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl HistoryEvent {
    pub fn new(event_id: i32, timestamp: DateTime<Utc>, kind: EventKind) -> Self {
        Self { event_id, timestamp, kind }
    }

    /// Event synthesized by the engine rather than assigned by user code.
    pub fn system(timestamp: DateTime<Utc>, kind: EventKind) -> Self {
        Self { event_id: SYSTEM_EVENT_ID, timestamp, kind }
    }

    pub fn is_system(&self) -> bool {
        self.event_id == SYSTEM_EVENT_ID
    }
}

/// Tagged variant set for history events and inbound task messages.
///
/// The same shape serves both purposes: a `TaskMessage` carries one of
/// these to an instance, and committed history is an ordered sequence of
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    /// Marks the start of one processing turn
    #[serde(rename = "orchestrator:started")]
    OrchestratorStarted,

    /// Marks the end of one processing turn
    #[serde(rename = "orchestrator:completed")]
    OrchestratorCompleted,

    /// Creates (or restarts, after continue-as-new) an execution
    #[serde(rename = "execution:started")]
    ExecutionStarted {
        name: TaskName,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<ParentInfo>,
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        tags: IndexMap<String, String>,
        /// Deferred start: delivery is held until this instant
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scheduled_start_time: Option<DateTime<Utc>>,
    },

    #[serde(rename = "execution:completed")]
    ExecutionCompleted {
        status: OrchestrationStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        failure: Option<TaskFailureDetails>,
    },

    #[serde(rename = "execution:terminated")]
    ExecutionTerminated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Restart marker recorded when an execution continues as new
    #[serde(rename = "continue-as-new")]
    ContinueAsNew {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<Value>,
    },

    #[serde(rename = "task:scheduled")]
    TaskScheduled {
        name: TaskName,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<Value>,
    },

    #[serde(rename = "task:completed")]
    TaskCompleted {
        /// Event id of the TaskScheduled this completes
        scheduled_id: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },

    #[serde(rename = "task:failed")]
    TaskFailed { scheduled_id: i32, failure: TaskFailureDetails },

    #[serde(rename = "sub-orchestration:created")]
    SubOrchestrationCreated {
        name: TaskName,
        instance_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<Value>,
    },

    #[serde(rename = "sub-orchestration:completed")]
    SubOrchestrationCompleted {
        scheduled_id: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },

    #[serde(rename = "sub-orchestration:failed")]
    SubOrchestrationFailed { scheduled_id: i32, failure: TaskFailureDetails },

    #[serde(rename = "timer:created")]
    TimerCreated { fire_at: DateTime<Utc> },

    /// Delivery is held until `fire_at`
    #[serde(rename = "timer:fired")]
    TimerFired { scheduled_id: i32, fire_at: DateTime<Utc> },

    /// External event delivered to this instance
    #[serde(rename = "event:raised")]
    EventRaised {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<Value>,
    },

    /// Record of an event this instance sent to another instance
    #[serde(rename = "event:sent")]
    EventSent {
        target_instance_id: String,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<Value>,
    },

    #[serde(rename = "execution:suspended")]
    ExecutionSuspended {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    #[serde(rename = "execution:resumed")]
    ExecutionResumed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Escape hatch for store- or host-specific markers
    #[serde(rename = "generic")]
    Generic {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
}

impl EventKind {
    /// Stable label for logs and wire error messages.
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::OrchestratorStarted => "orchestrator:started",
            EventKind::OrchestratorCompleted => "orchestrator:completed",
            EventKind::ExecutionStarted { .. } => "execution:started",
            EventKind::ExecutionCompleted { .. } => "execution:completed",
            EventKind::ExecutionTerminated { .. } => "execution:terminated",
            EventKind::ContinueAsNew { .. } => "continue-as-new",
            EventKind::TaskScheduled { .. } => "task:scheduled",
            EventKind::TaskCompleted { .. } => "task:completed",
            EventKind::TaskFailed { .. } => "task:failed",
            EventKind::SubOrchestrationCreated { .. } => "sub-orchestration:created",
            EventKind::SubOrchestrationCompleted { .. } => "sub-orchestration:completed",
            EventKind::SubOrchestrationFailed { .. } => "sub-orchestration:failed",
            EventKind::TimerCreated { .. } => "timer:created",
            EventKind::TimerFired { .. } => "timer:fired",
            EventKind::EventRaised { .. } => "event:raised",
            EventKind::EventSent { .. } => "event:sent",
            EventKind::ExecutionSuspended { .. } => "execution:suspended",
            EventKind::ExecutionResumed { .. } => "execution:resumed",
            EventKind::Generic { .. } => "generic",
        }
    }

    /// True for the four "outbound echo" kinds the cursor matches against
    /// pending actions during replay.
    pub fn is_scheduled_echo(&self) -> bool {
        matches!(
            self,
            EventKind::TaskScheduled { .. }
                | EventKind::SubOrchestrationCreated { .. }
                | EventKind::TimerCreated { .. }
                | EventKind::EventSent { .. }
        )
    }

    /// The scheduled event id a completion references, if this is a
    /// completion kind.
    pub fn completion_scheduled_id(&self) -> Option<i32> {
        match self {
            EventKind::TaskCompleted { scheduled_id, .. }
            | EventKind::TaskFailed { scheduled_id, .. }
            | EventKind::SubOrchestrationCompleted { scheduled_id, .. }
            | EventKind::SubOrchestrationFailed { scheduled_id, .. }
            | EventKind::TimerFired { scheduled_id, .. } => Some(*scheduled_id),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
