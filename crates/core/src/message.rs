// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task messages and the transport envelope the hub routes by.

use crate::history::{EventKind, HistoryEvent};
use crate::instance::{OrchestrationInstance, ParentInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An inbound message for one orchestration instance: the instance it is
/// addressed to plus the event it will induce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub instance: OrchestrationInstance,
    pub event: HistoryEvent,
}

impl TaskMessage {
    pub fn new(instance: OrchestrationInstance, event: HistoryEvent) -> Self {
        Self { instance, event }
    }

    /// The instant before which this message must not be delivered, if any
    /// (deferred starts and timers).
    pub fn visible_at(&self) -> Option<DateTime<Utc>> {
        match &self.event.kind {
            EventKind::ExecutionStarted { scheduled_start_time, .. } => *scheduled_start_time,
            EventKind::TimerFired { fire_at, .. } => Some(*fire_at),
            _ => None,
        }
    }

    /// True for messages that may create an instance that does not exist yet.
    pub fn is_start(&self) -> bool {
        matches!(self.event.kind, EventKind::ExecutionStarted { .. })
    }
}

/// Transport envelope for one dispatchable message: the routing key the
/// hub-side router demultiplexes on, the message itself, the parent link
/// (for sub-orchestration completions), and the store's delete receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkMessage {
    pub dispatch_id: String,
    pub message: TaskMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pop_receipt: Option<String>,
}

impl WorkMessage {
    /// Envelope routed by instance id (orchestrator messages).
    pub fn for_instance(message: TaskMessage) -> Self {
        Self {
            dispatch_id: message.instance.instance_id.clone(),
            message,
            parent: None,
            pop_receipt: None,
        }
    }

    crate::setters! {
        option {
            parent: ParentInfo,
            pop_receipt: String,
        }
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
