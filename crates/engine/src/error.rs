// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker error taxonomy.

use dt_core::TaskFailureDetails;
use thiserror::Error;

/// How user orchestrator code signals failure.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// Fail the orchestration with these details.
    #[error("{0}")]
    Failure(TaskFailureDetails),

    /// Abandon the work item without committing anything; the store will
    /// retry the turn. For transient conditions the orchestrator cannot
    /// handle deterministically.
    #[error("work item aborted")]
    AbortWorkItem,
}

impl From<TaskFailureDetails> for OrchestrationError {
    fn from(details: TaskFailureDetails) -> Self {
        OrchestrationError::Failure(details)
    }
}

/// Errors from the worker runtime itself.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Replay diverged from history: the user code did not re-produce the
    /// recorded actions. Fatal to the orchestration.
    #[error("non-deterministic orchestrator: {0}")]
    Nondeterminism(String),

    /// The work item named an orchestrator or activity that is not
    /// registered.
    #[error("no registration for {0}")]
    Unregistered(String),
}

impl WorkerError {
    /// Failure payload reported to the hub for this error.
    pub fn failure_details(&self) -> TaskFailureDetails {
        match self {
            WorkerError::Nondeterminism(msg) => {
                TaskFailureDetails::non_retriable("NondeterminismError", msg.clone())
            }
            WorkerError::Unregistered(name) => TaskFailureDetails::non_retriable(
                "UnregisteredTask",
                format!("no registration for {}", name),
            ),
        }
    }
}
