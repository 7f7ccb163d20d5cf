// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestration runtime status.

use serde::{Deserialize, Serialize};

/// Lifecycle status of one orchestration execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrchestrationStatus {
    /// Created but no turn has run yet
    Pending,
    /// At least one turn has run and the execution is not finished
    Running,
    /// Execution paused; inbound messages accumulate until resumed
    Suspended,
    Completed,
    Failed,
    Terminated,
    Canceled,
    /// Execution restarted with fresh history under a new execution id
    ContinuedAsNew,
}

impl OrchestrationStatus {
    /// Terminal = {Completed, Failed, Terminated, Canceled}.
    ///
    /// ContinuedAsNew is not terminal: the instance lives on under a new
    /// execution id.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrchestrationStatus::Completed
                | OrchestrationStatus::Failed
                | OrchestrationStatus::Terminated
                | OrchestrationStatus::Canceled
        )
    }

    /// Default dedupe set for instance creation: an existing record in one
    /// of these statuses makes a duplicate create fail with AlreadyExists.
    pub fn dedupe_default() -> Vec<OrchestrationStatus> {
        vec![OrchestrationStatus::Pending, OrchestrationStatus::Running]
    }
}

crate::simple_display! {
    OrchestrationStatus {
        Pending => "pending",
        Running => "running",
        Suspended => "suspended",
        Completed => "completed",
        Failed => "failed",
        Terminated => "terminated",
        Canceled => "canceled",
        ContinuedAsNew => "continued-as-new",
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
