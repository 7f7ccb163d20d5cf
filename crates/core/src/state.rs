// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime state: the durable truth for one execution of one instance.
//!
//! State is derived from history events. Events are facts about what
//! happened; state is derived from those facts.
//!
//! # Idempotency Requirement
//!
//! **All event handlers in [`RuntimeState::apply_event`] MUST be
//! idempotent.** Applying the same event twice must produce the same state
//! as applying it once, because events are applied both when produced (for
//! immediate visibility inside a turn) and when replayed from committed
//! history.

use crate::failure::TaskFailureDetails;
use crate::history::{EventKind, HistoryEvent};
use crate::instance::{OrchestrationInstance, ParentInfo, TaskName};
use crate::message::TaskMessage;
use crate::status::OrchestrationStatus;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Durable state of one orchestration execution.
///
/// `execution_id` is immutable within a `RuntimeState`; continue-as-new
/// produces a whole new state value (see `apply::apply_actions`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeState {
    pub instance: OrchestrationInstance,
    pub name: TaskName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentInfo>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub tags: IndexMap<String, String>,
    /// Committed history, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub past_events: Vec<HistoryEvent>,
    /// Events produced in the current turn, not yet committed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_events: Vec<HistoryEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<TaskFailureDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_status: Option<String>,
    pub runtime_status: OrchestrationStatus,
}

impl RuntimeState {
    /// Fresh state for an instance with nothing applied yet.
    pub fn new(instance: OrchestrationInstance) -> Self {
        Self {
            instance,
            name: TaskName::new(""),
            created_at: None,
            completed_at: None,
            last_updated: None,
            parent: None,
            tags: IndexMap::new(),
            past_events: Vec::new(),
            new_events: Vec::new(),
            input: None,
            output: None,
            failure: None,
            custom_status: None,
            runtime_status: OrchestrationStatus::Pending,
        }
    }

    /// Rebuild state from committed history. An empty history yields a
    /// Pending state regardless of anything else.
    pub fn from_history(instance: OrchestrationInstance, past_events: Vec<HistoryEvent>) -> Self {
        let mut state = Self::new(instance);
        for event in &past_events {
            state.apply_kind(event);
        }
        state.past_events = past_events;
        state
    }

    /// Append an event produced in the current turn and apply its effect.
    pub fn add_event(&mut self, event: HistoryEvent) {
        self.apply_kind(&event);
        self.new_events.push(event);
    }

    /// Move the current turn's events into committed history.
    pub fn commit(&mut self) {
        self.past_events.append(&mut self.new_events);
    }

    /// Next free orchestrator-assigned event id.
    pub fn next_event_id(&self) -> i32 {
        self.past_events
            .iter()
            .chain(self.new_events.iter())
            .map(|e| e.event_id)
            .max()
            .map_or(0, |max| max.max(-1) + 1)
    }

    pub fn is_terminal(&self) -> bool {
        self.runtime_status.is_terminal()
    }

    /// Reject inbound messages that would corrupt this execution: a message
    /// stamped with a different execution id (stale generation after
    /// continue-as-new), or a duplicate start/complete. Returns the
    /// rejection reason, or `None` when the message is acceptable.
    pub fn rejects_inbound(&self, msg: &TaskMessage) -> Option<String> {
        if !msg.instance.execution_id.is_empty()
            && msg.instance.execution_id != self.instance.execution_id
        {
            return Some(format!(
                "message for execution {} does not match current execution {}",
                msg.instance.execution_id, self.instance.execution_id
            ));
        }
        match &msg.event.kind {
            EventKind::ExecutionStarted { .. } if self.created_at.is_some() => {
                Some("duplicate execution:started for an already-started execution".to_string())
            }
            EventKind::ExecutionCompleted { .. } if self.is_terminal() => {
                Some("duplicate execution:completed for a terminal execution".to_string())
            }
            _ => None,
        }
    }

    /// Derive state changes from one event. Idempotent (see module doc).
    fn apply_kind(&mut self, event: &HistoryEvent) {
        match &event.kind {
            EventKind::ExecutionStarted { name, input, parent, tags, .. } => {
                if self.created_at.is_none() {
                    self.created_at = Some(event.timestamp);
                    self.name = name.clone();
                    self.input = input.clone();
                    self.parent = parent.clone();
                    self.tags = tags.clone();
                    self.runtime_status = OrchestrationStatus::Running;
                }
            }
            EventKind::ExecutionCompleted { status, result, failure } => {
                if !self.runtime_status.is_terminal() {
                    self.runtime_status = *status;
                    self.completed_at = Some(event.timestamp);
                    self.output = result.clone();
                    self.failure = failure.clone();
                }
            }
            EventKind::ContinueAsNew { .. } => {
                if !self.runtime_status.is_terminal() {
                    self.runtime_status = OrchestrationStatus::ContinuedAsNew;
                }
            }
            EventKind::ExecutionSuspended { .. } => {
                if self.runtime_status == OrchestrationStatus::Running {
                    self.runtime_status = OrchestrationStatus::Suspended;
                }
            }
            EventKind::ExecutionResumed { .. } => {
                if self.runtime_status == OrchestrationStatus::Suspended {
                    self.runtime_status = OrchestrationStatus::Running;
                }
            }
            // Terminated arrives as an inbound message; the applier turns it
            // into ExecutionCompleted(Terminated). Everything else carries no
            // state beyond its presence in history.
            _ => {}
        }
    }
}

crate::builder! {
    pub struct RuntimeStateBuilder => RuntimeState {
        into {
            name: TaskName = "TestOrchestration",
        }
        set {
            instance: OrchestrationInstance = OrchestrationInstance::new("test-instance"),
            tags: IndexMap<String, String> = IndexMap::new(),
            past_events: Vec<HistoryEvent> = Vec::new(),
            new_events: Vec<HistoryEvent> = Vec::new(),
            runtime_status: OrchestrationStatus = OrchestrationStatus::Pending,
        }
        option {
            created_at: DateTime<Utc> = None,
            completed_at: DateTime<Utc> = None,
            last_updated: DateTime<Utc> = None,
            parent: ParentInfo = None,
            input: Value = None,
            output: Value = None,
            failure: TaskFailureDetails = None,
            custom_status: String = None,
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
