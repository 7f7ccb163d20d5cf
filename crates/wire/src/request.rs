// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Requests from workers and management clients to the hub.

use crate::types::{TaskError, WireStatus};
use chrono::{DateTime, Utc};
use dt_core::{OrchestratorAction, TaskName};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request from a worker connection to the hub.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum WorkerRequest {
    /// Version handshake; the reply begins the work-item stream.
    Hello { version: String },

    /// Result of one activity invocation
    CompleteActivity { result: ActivityResult },

    /// Result of one orchestration turn
    CompleteOrchestrator { result: OrchestratorResult },
}

/// Success-or-failure of one activity invocation, addressed by the
/// `instance_id "." task_id` dispatch key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityResult {
    pub instance_id: String,
    pub task_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<TaskError>,
}

/// The action batch one orchestration turn produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestratorResult {
    pub instance_id: String,
    pub actions: Vec<OrchestratorAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_status: Option<String>,
}

/// Request from a management client to the hub.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ClientRequest {
    /// Version handshake
    Hello { version: String },

    /// Create and start an orchestration
    Schedule {
        name: TaskName,
        /// Server generates one when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instance_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<Value>,
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        tags: IndexMap<String, String>,
        /// Deferred start
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_at: Option<DateTime<Utc>>,
        /// Dedupe against these statuses; empty means no dedupe
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        dedupe_statuses: Vec<WireStatus>,
    },

    /// Fetch current state
    Get {
        instance_id: String,
        /// Include the event history in the reply
        #[serde(default)]
        expand_history: bool,
    },

    /// Block until the instance reaches a terminal status (or one of
    /// `states`, when non-empty)
    WaitForState {
        instance_id: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        states: Vec<WireStatus>,
        timeout_ms: u64,
    },

    RaiseEvent {
        instance_id: String,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<Value>,
    },

    Terminate {
        instance_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    Suspend {
        instance_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    Resume {
        instance_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    Query { filter: QueryFilter },

    /// Purge one terminal instance or every terminal instance matching a
    /// filter
    Purge {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instance_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<QueryFilter>,
    },
}

/// Metadata filter for queries and bulk purges.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statuses: Vec<WireStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_to: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id_prefix: Option<String>,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation: Option<String>,
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
