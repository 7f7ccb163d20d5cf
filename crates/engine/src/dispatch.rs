// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker dispatcher: consumes work items from the hub, runs the
//! right runner, and reports results.
//!
//! Activities run concurrently on the task pool, bounded by a semaphore.
//! Orchestration turns run on blocking threads: the cursor and the user
//! future are single-threaded by construction.

use crate::activity::ActivityRunner;
use crate::cursor::{OrchestrationCursor, TurnOutcome};
use crate::registry::Registry;
use dt_hub::{DispatchedWorkItem, HubDispatcher, OrchestratorTurn};
use dt_wire::OrchestratorResult;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Hard cap on activity concurrency, matching the hub's batch cap.
const ACTIVITY_CONCURRENCY_CAP: usize = 32;

/// Tunables accepted at the worker boundary.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Concurrent activity invocations (capped at 32).
    pub activity_batch_size: usize,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self { activity_batch_size: 32 }
    }
}

impl WorkerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activity_batch_size(mut self, v: usize) -> Self {
        self.activity_batch_size = v.clamp(1, ACTIVITY_CONCURRENCY_CAP);
        self
    }
}

/// Worker loop over one hub work-item stream.
pub struct WorkerDispatcher {
    hub: Arc<HubDispatcher>,
    registry: Arc<Registry>,
    options: WorkerOptions,
}

impl WorkerDispatcher {
    pub fn new(hub: Arc<HubDispatcher>, registry: Registry) -> Arc<Self> {
        Self::with_options(hub, registry, WorkerOptions::default())
    }

    pub fn with_options(
        hub: Arc<HubDispatcher>,
        registry: Registry,
        options: WorkerOptions,
    ) -> Arc<Self> {
        Arc::new(Self { hub, registry: Arc::new(registry), options })
    }

    /// Spawn the worker loop.
    pub fn start(self: &Arc<Self>, ct: &CancellationToken) {
        let worker = Arc::clone(self);
        let ct = ct.clone();
        tokio::spawn(async move { worker.run(ct).await });
    }

    async fn run(self: Arc<Self>, ct: CancellationToken) {
        let mut stream = self.hub.work_item_stream();
        let permits = Arc::new(Semaphore::new(self.options.activity_batch_size));
        info!(activity_batch = self.options.activity_batch_size, "worker started");
        loop {
            let item = tokio::select! {
                item = stream.next() => item,
                _ = ct.cancelled() => break,
            };
            match item {
                Some(DispatchedWorkItem::Activity(wi)) => {
                    let permit = match Arc::clone(&permits).acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };
                    let worker = Arc::clone(&self);
                    tokio::spawn(async move {
                        let result = ActivityRunner::run(&worker.registry, &wi).await;
                        if let Err(e) = worker.hub.complete_activity_task(result).await {
                            warn!(dispatch = %wi.dispatch_id(), error = %e, "activity completion rejected");
                        }
                        drop(permit);
                    });
                }
                Some(DispatchedWorkItem::Orchestrator(turn)) => {
                    let worker = Arc::clone(&self);
                    tokio::spawn(async move { worker.run_orchestration(turn).await });
                }
                None => break,
            }
        }
        info!("worker stopped");
    }

    /// Drive one orchestration turn to its action batch and report it.
    async fn run_orchestration(&self, turn: OrchestratorTurn) {
        let instance_id = turn.item.instance.instance_id.clone();
        let registry = Arc::clone(&self.registry);
        let outcome =
            tokio::task::spawn_blocking(move || execute_turn(registry, turn)).await;
        match outcome {
            Ok(TurnOutcome::Actions { actions, custom_status }) => {
                let result =
                    OrchestratorResult { instance_id: instance_id.clone(), actions, custom_status };
                if let Err(e) = self.hub.complete_orchestrator_task(result).await {
                    warn!(instance = %instance_id, error = %e, "turn completion rejected");
                }
            }
            Ok(TurnOutcome::Abort) => {
                self.hub.abandon_orchestrator_task(&instance_id).await;
            }
            Err(join_err) => {
                // A panicking orchestrator poisons nothing: abandon and let
                // the store retry.
                error!(instance = %instance_id, error = %join_err, "turn crashed");
                self.hub.abandon_orchestrator_task(&instance_id).await;
            }
        }
    }
}

/// Run one turn to completion on the current (blocking) thread: replay
/// history, process every available message, then close the turn.
fn execute_turn(registry: Arc<Registry>, mut turn: OrchestratorTurn) -> TurnOutcome {
    let mut cursor = OrchestrationCursor::new(registry, &turn.item);
    cursor.replay(&turn.item.replay_history);

    // The seeded batch plus any carry-over that arrives while the turn is
    // in flight; the turn ends when the channel has nothing more for us.
    while let Ok(envelope) = turn.messages.try_recv() {
        cursor.handle_message(&envelope.message);
    }
    debug!(instance = %turn.item.instance.instance_id, "turn drained");
    cursor.finish()
}

/// Variant of [`execute_turn`] for pre-drained message batches (remote
/// workers receive the turn as one frame).
pub(crate) fn execute_turn_batch(
    registry: Arc<Registry>,
    item: &dt_core::OrchestratorWorkItem,
) -> TurnOutcome {
    let mut cursor = OrchestrationCursor::new(registry, item);
    cursor.replay(&item.replay_history);
    for envelope in &item.new_messages {
        cursor.handle_message(&envelope.message);
    }
    cursor.finish()
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
