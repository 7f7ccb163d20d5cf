// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Responses from the hub to workers and management clients.

use crate::types::{ErrorCode, TaskError, WireStatus};
use chrono::{DateTime, Utc};
use dt_core::{HistoryEvent, RuntimeState, TaskName};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// Success without a payload (acks, handshakes)
    Ok,

    Error { code: ErrorCode, message: String },

    Instance { info: Box<OrchestrationInfo> },

    Page {
        instances: Vec<OrchestrationInfo>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        continuation: Option<String>,
    },

    Purged { count: u64 },
}

impl Response {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Response::Error { code, message: message.into() }
    }
}

/// Client-visible snapshot of one orchestration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestrationInfo {
    pub instance_id: String,
    pub execution_id: String,
    pub name: TaskName,
    pub status: WireStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<TaskError>,
    /// Present only when the caller asked for expanded history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryEvent>>,
}

impl OrchestrationInfo {
    /// Project a runtime state into its client-visible form.
    pub fn from_state(state: &RuntimeState, expand_history: bool) -> Self {
        Self {
            instance_id: state.instance.instance_id.clone(),
            execution_id: state.instance.execution_id.clone(),
            name: state.name.clone(),
            status: state.runtime_status.into(),
            created_at: state.created_at,
            completed_at: state.completed_at,
            last_updated: state.last_updated,
            input: state.input.clone(),
            output: state.output.clone(),
            custom_status: state.custom_status.clone(),
            failure: state.failure.as_ref().map(TaskError::from),
            history: expand_history.then(|| state.past_events.clone()),
        }
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
