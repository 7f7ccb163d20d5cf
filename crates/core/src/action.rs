// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Actions a worker emits at the end of an orchestration turn.

use crate::failure::TaskFailureDetails;
use crate::history::HistoryEvent;
use crate::instance::TaskName;
use crate::status::OrchestrationStatus;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One outbound action from an orchestration turn. The `id` equals the
/// event id of the history event the action will produce; ids are unique
/// and contiguous within a turn, starting from the turn's next free
/// counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorAction {
    pub id: i32,
    #[serde(flatten)]
    pub kind: ActionKind,
}

/// Tagged variant set for orchestrator actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ActionKind {
    #[serde(rename = "schedule-task")]
    ScheduleTask {
        name: TaskName,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<Value>,
    },

    #[serde(rename = "create-timer")]
    CreateTimer { fire_at: DateTime<Utc> },

    #[serde(rename = "create-sub-orchestration")]
    CreateSubOrchestration {
        name: TaskName,
        instance_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<Value>,
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        tags: IndexMap<String, String>,
    },

    #[serde(rename = "send-event")]
    SendEvent {
        target_instance_id: String,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<Value>,
    },

    #[serde(rename = "complete-orchestration")]
    CompleteOrchestration { outcome: CompletionOutcome },
}

/// How an orchestration turn finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOutcome {
    pub status: OrchestrationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<TaskFailureDetails>,
    /// Continue-as-new only: external events carried into the next
    /// generation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub carryover: Vec<HistoryEvent>,
    /// Continue-as-new only: version override for the next generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_version: Option<String>,
}

impl CompletionOutcome {
    pub fn completed(result: Option<Value>) -> Self {
        Self {
            status: OrchestrationStatus::Completed,
            result,
            failure: None,
            carryover: Vec::new(),
            new_version: None,
        }
    }

    pub fn failed(failure: TaskFailureDetails) -> Self {
        Self {
            status: OrchestrationStatus::Failed,
            result: None,
            failure: Some(failure),
            carryover: Vec::new(),
            new_version: None,
        }
    }

    pub fn terminated(reason: Option<Value>) -> Self {
        Self {
            status: OrchestrationStatus::Terminated,
            result: reason,
            failure: None,
            carryover: Vec::new(),
            new_version: None,
        }
    }

    pub fn continued_as_new(input: Option<Value>, carryover: Vec<HistoryEvent>) -> Self {
        Self {
            status: OrchestrationStatus::ContinuedAsNew,
            result: input,
            failure: None,
            carryover,
            new_version: None,
        }
    }

    pub fn is_continue_as_new(&self) -> bool {
        self.status == OrchestrationStatus::ContinuedAsNew
    }
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
