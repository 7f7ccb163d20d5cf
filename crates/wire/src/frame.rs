// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Frames the hub streams to a connected worker.

use dt_core::{ActivityWorkItem, OrchestratorWorkItem, WorkMessage};
use serde::{Deserialize, Serialize};

/// One frame on the hub → worker stream.
///
/// The common shape delivers whole work items. The streamed-history
/// variant spells one orchestrator turn out as a sub-stream: past events
/// as `OrchestratorMessage` frames, a `Resumed` sentinel, new messages,
/// then `Disconnect` to close the sub-stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum WorkItemFrame {
    Activity { item: ActivityWorkItem },

    Orchestrator { item: Box<OrchestratorWorkItem> },

    /// Streamed-history variant: one replayed or new message
    OrchestratorMessage { instance_id: String, message: WorkMessage },

    /// Streamed-history variant: history is done, new messages follow
    Resumed { instance_id: String },

    /// Streamed-history variant: end of the turn's sub-stream
    Disconnect { instance_id: String },

    /// The hub is shutting down; no more work items will follow
    Shutdown,
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
