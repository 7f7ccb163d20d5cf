// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work items: what the store hands to the hub and the hub hands to workers.

use crate::history::HistoryEvent;
use crate::instance::{activity_dispatch_id, OrchestrationInstance, ParentInfo, TaskName};
use crate::message::WorkMessage;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One orchestration turn: the committed history to replay plus the new
/// messages to process. Holds the store's lock until completed, abandoned,
/// or released.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorWorkItem {
    pub instance: OrchestrationInstance,
    pub name: TaskName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentInfo>,
    pub replay_history: Vec<HistoryEvent>,
    pub new_messages: Vec<WorkMessage>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub metadata: IndexMap<String, String>,
    /// Store lock token; opaque to everything but the store.
    pub lock_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_expires_at: Option<DateTime<Utc>>,
}

impl OrchestratorWorkItem {
    pub fn instance_id(&self) -> &str {
        &self.instance.instance_id
    }
}

/// One activity invocation. `instance` is the parent orchestration the
/// result is delivered back to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityWorkItem {
    pub instance: OrchestrationInstance,
    pub name: TaskName,
    /// Event id of the TaskScheduled event that produced this invocation.
    pub task_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    pub lock_token: String,
}

impl ActivityWorkItem {
    /// Routing key the hub tracks this invocation under.
    pub fn dispatch_id(&self) -> String {
        activity_dispatch_id(&self.instance.instance_id, self.task_id)
    }
}

#[cfg(test)]
#[path = "work_item_tests.rs"]
mod tests;
