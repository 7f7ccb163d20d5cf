// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The store contract the hub and workers program against.

use crate::error::StoreError;
use crate::query::{OrchestrationQuery, QueryPage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dt_core::{
    ActivityWorkItem, OrchestrationStatus, OrchestratorWorkItem, RuntimeState, TaskMessage,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Everything the hub commits at the end of one orchestration turn, in one
/// atomic operation: the new runtime state (with uncommitted `new_events`),
/// the outbound messages the turn produced, and the status row update.
#[derive(Debug)]
pub struct TurnCommit {
    pub state: RuntimeState,
    pub activity_messages: Vec<TaskMessage>,
    pub orchestrator_messages: Vec<TaskMessage>,
    pub timer_messages: Vec<TaskMessage>,
    pub updated_status: OrchestrationStatus,
}

impl From<dt_core::ApplyOutcome> for TurnCommit {
    fn from(outcome: dt_core::ApplyOutcome) -> Self {
        Self {
            state: outcome.state,
            activity_messages: outcome.activity_messages,
            orchestrator_messages: outcome.orchestrator_messages,
            timer_messages: outcome.timer_messages,
            updated_status: outcome.updated_status,
        }
    }
}

/// Durable orchestration store.
///
/// Blocking dequeues (`lock_next_*`, `wait_for_terminal`) resolve with
/// [`StoreError::Canceled`] when their token fires. At most one
/// orchestration lock is outstanding per instance at any time.
#[async_trait]
pub trait Store: Send + Sync {
    /// Atomically create an instance from its start message. Fails with
    /// [`StoreError::AlreadyExists`] when a record exists with a status in
    /// `dedupe_statuses` (callers usually pass
    /// [`OrchestrationStatus::dedupe_default`]).
    async fn create_instance(
        &self,
        start: TaskMessage,
        dedupe_statuses: &[OrchestrationStatus],
    ) -> Result<(), StoreError>;

    /// Deliver a message to the instance it is addressed to. Deferred
    /// messages (future `scheduled_start_time` / `fire_at`) become visible
    /// at their instant. Non-start messages to a terminal or missing
    /// instance are dropped with a warning; a start message to a missing
    /// instance auto-creates it.
    async fn append_message(&self, msg: TaskMessage) -> Result<(), StoreError>;

    /// Single-consumer blocking dequeue of the next activity invocation.
    async fn lock_next_activity(
        &self,
        ct: &CancellationToken,
    ) -> Result<ActivityWorkItem, StoreError>;

    /// Blocks until an instance is ready to run, then locks it and returns
    /// its turn: committed history plus the currently visible new messages.
    async fn lock_next_orchestration(
        &self,
        ct: &CancellationToken,
    ) -> Result<OrchestratorWorkItem, StoreError>;

    /// Extend the lock on an in-flight work item. Returns the new expiry.
    async fn renew_orchestration_lock(
        &self,
        wi: &OrchestratorWorkItem,
    ) -> Result<DateTime<Utc>, StoreError>;

    /// Return the instance to idle. If messages arrived during the turn it
    /// immediately becomes ready to run again.
    async fn release_orchestration_lock(&self, wi: &OrchestratorWorkItem)
        -> Result<(), StoreError>;

    /// Atomically persist a turn: commit new events, enqueue outbound
    /// messages, update the status row, delete the consumed messages, and
    /// clear the lock.
    async fn complete_orchestration(
        &self,
        wi: &OrchestratorWorkItem,
        commit: TurnCommit,
    ) -> Result<(), StoreError>;

    /// Undo a dispatch: consumed messages return to the pending queue and
    /// the lock clears.
    async fn abandon_orchestration(&self, wi: &OrchestratorWorkItem) -> Result<(), StoreError>;

    /// Persist an activity result as an inbound message for its parent
    /// orchestration and drop the activity lock.
    async fn complete_activity(
        &self,
        wi: &ActivityWorkItem,
        response: TaskMessage,
    ) -> Result<(), StoreError>;

    /// Re-enqueue a failed activity invocation (after a short delay).
    async fn abandon_activity(&self, wi: &ActivityWorkItem) -> Result<(), StoreError>;

    /// Current state of an instance, optionally pinned to one execution id.
    async fn get_state(
        &self,
        instance_id: &str,
        execution_id: Option<&str>,
    ) -> Result<Option<RuntimeState>, StoreError>;

    async fn query(&self, query: &OrchestrationQuery) -> Result<QueryPage, StoreError>;

    /// Remove a terminal instance. Returns the number of purged instances
    /// (0 or 1).
    async fn purge(&self, instance_id: &str) -> Result<u64, StoreError>;

    /// Remove every terminal instance matching the filter.
    async fn purge_matching(&self, query: &OrchestrationQuery) -> Result<u64, StoreError>;

    /// Resolve when the instance reaches a terminal status.
    async fn wait_for_terminal(
        &self,
        instance_id: &str,
        timeout: Duration,
        ct: &CancellationToken,
    ) -> Result<RuntimeState, StoreError>;

    /// Equivalent to appending an `ExecutionTerminated` inbound message.
    async fn force_terminate(
        &self,
        instance_id: &str,
        reason: Option<String>,
    ) -> Result<(), StoreError>;
}
