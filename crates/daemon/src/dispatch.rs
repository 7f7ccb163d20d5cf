// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The hub dispatcher: store → work queue → worker streams → store.
//!
//! Two producer loops (activities, orchestrations) pull from the store
//! while at least one worker stream is connected, pushing into a bounded
//! work queue. Completion calls look the work item up in the pending maps,
//! run the action applier, and commit. The per-instance store lock makes
//! at most one turn per instance run globally; activities need no
//! ordering.

use crate::config::HubOptions;
use crate::error::HubError;
use crate::latch::AsyncLatch;
use crate::router::MessageRouter;
use crate::session::Session;
use chrono::Utc;
use dt_core::{
    activity_dispatch_id, apply_actions, ActivityWorkItem, Clock, EventKind, HistoryEvent,
    OrchestratorWorkItem, SystemClock, TaskFailureDetails, TaskMessage, WorkMessage,
};
use dt_store::{Store, StoreError};
use dt_wire::{ActivityResult, OrchestratorResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Delay before retrying after an unexpected store error in a producer
/// loop.
const PRODUCER_RETRY_DELAY: Duration = Duration::from_secs(1);

/// One entry on the hub → worker work queue.
pub enum DispatchedWorkItem {
    Activity(ActivityWorkItem),
    Orchestrator(OrchestratorTurn),
}

/// An orchestration turn as handed to a worker: the work item (history to
/// replay) plus the session channel carrying this turn's messages.
pub struct OrchestratorTurn {
    pub item: OrchestratorWorkItem,
    /// This turn's messages, pre-seeded; carry-over arrivals may extend it
    /// while the turn is in flight.
    pub messages: mpsc::UnboundedReceiver<WorkMessage>,
}

/// Hub dispatcher. Long-lived singleton per process, started and stopped
/// with the host.
pub struct HubDispatcher<C: Clock = SystemClock> {
    store: Arc<dyn Store>,
    clock: C,
    options: HubOptions,
    router: Arc<MessageRouter>,
    readers_available: Arc<AsyncLatch>,
    reader_count: AtomicUsize,
    work_tx: mpsc::Sender<DispatchedWorkItem>,
    work_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<DispatchedWorkItem>>>,
    pending_orchestrations: Mutex<HashMap<String, Session>>,
    pending_activities: Mutex<HashMap<String, ActivityWorkItem>>,
    shutdown: CancellationToken,
    disposed: AtomicBool,
}

impl HubDispatcher<SystemClock> {
    pub fn new(store: Arc<dyn Store>, options: HubOptions) -> Arc<Self> {
        Self::with_clock(store, options, SystemClock)
    }
}

impl<C: Clock> HubDispatcher<C> {
    pub fn with_clock(store: Arc<dyn Store>, options: HubOptions, clock: C) -> Arc<Self> {
        let (work_tx, work_rx) = mpsc::channel(options.work_item_buffer_capacity);
        Arc::new(Self {
            store,
            clock,
            options,
            router: Arc::new(MessageRouter::new()),
            readers_available: Arc::new(AsyncLatch::new()),
            reader_count: AtomicUsize::new(0),
            work_tx,
            work_rx: Arc::new(tokio::sync::Mutex::new(work_rx)),
            pending_orchestrations: Mutex::new(HashMap::new()),
            pending_activities: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
            disposed: AtomicBool::new(false),
        })
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Spawn the producer loops, linked to the host's cancellation signal.
    pub fn start(self: &Arc<Self>, host_ct: &CancellationToken) {
        let ct = self.shutdown.clone();
        {
            let host = host_ct.clone();
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move {
                host.cancelled().await;
                shutdown.cancel();
            });
        }
        {
            let hub = Arc::clone(self);
            let ct = ct.clone();
            tokio::spawn(async move { hub.orchestration_loop(ct).await });
        }
        {
            let hub = Arc::clone(self);
            tokio::spawn(async move { hub.activity_loop(ct).await });
        }
        info!("hub dispatcher started");
    }

    /// Open a work-item stream for a connected worker. The first stream
    /// flips the readers latch and enables the dequeue loops; dropping the
    /// last one resets it so they park.
    pub fn work_item_stream(self: &Arc<Self>) -> WorkItemStream<C> {
        if self.reader_count.fetch_add(1, Ordering::SeqCst) == 0 {
            self.readers_available.set();
            debug!("first worker stream connected, dequeue enabled");
        }
        WorkItemStream { hub: Arc::clone(self), ct: self.shutdown.child_token() }
    }

    /// Resolve a pending activity with the worker's result.
    pub async fn complete_activity_task(&self, result: ActivityResult) -> Result<(), HubError> {
        let key = activity_dispatch_id(&result.instance_id, result.task_id);
        let wi = self
            .pending_activities
            .lock()
            .remove(&key)
            .ok_or_else(|| HubError::NotFound(key.clone()))?;

        let kind = match &result.failure {
            Some(failure) => EventKind::TaskFailed {
                scheduled_id: result.task_id,
                failure: TaskFailureDetails::from(failure),
            },
            None => EventKind::TaskCompleted {
                scheduled_id: result.task_id,
                result: result.result.clone(),
            },
        };
        let response = TaskMessage::new(
            wi.instance.clone(),
            HistoryEvent::system(self.clock.now_utc(), kind),
        );
        self.store.complete_activity(&wi, response.clone()).await?;

        // Routed path: an in-flight turn for this instance consumes the
        // completion immediately instead of waiting for the next turn.
        let envelope = WorkMessage::for_instance(response);
        let mut pending = self.pending_orchestrations.lock();
        if let Some(session) = pending.get_mut(&result.instance_id) {
            if self.router.deliver(&result.instance_id, envelope.clone()) {
                session.record_routed(envelope);
                debug!(instance = %result.instance_id, task = result.task_id, "routed completion into in-flight turn");
            }
        }
        Ok(())
    }

    /// Apply one turn's actions and commit (or re-dispatch, for
    /// continue-as-new). The lock is released on every exit path.
    pub async fn complete_orchestrator_task(
        &self,
        result: OrchestratorResult,
    ) -> Result<(), HubError> {
        let mut session = self
            .pending_orchestrations
            .lock()
            .remove(&result.instance_id)
            .ok_or_else(|| HubError::NotFound(result.instance_id.clone()))?;
        // Stop routing into a finished turn; late messages go to the store.
        session.release(&self.router);

        let outcome = match apply_actions(
            self.clock.now_utc(),
            session.turn_state(),
            &result.actions,
            result.custom_status.clone(),
        ) {
            Ok(outcome) => outcome,
            Err(apply_err) => {
                error!(instance = %result.instance_id, error = %apply_err, "action batch rejected, abandoning turn");
                let wi = session.work_item().clone();
                let abandon = self.store.abandon_orchestration(&wi).await;
                let release = self.store.release_orchestration_lock(&wi).await;
                if let Err(e) = abandon.and(release) {
                    warn!(instance = %result.instance_id, error = %e, "cleanup after rejected batch failed");
                }
                return Err(apply_err.into());
            }
        };

        if outcome.continue_as_new {
            return self.redispatch_as_new(session, outcome.state).await;
        }

        let wi = session.work_item().clone();
        let status = outcome.updated_status;
        let commit_result = self.store.complete_orchestration(&wi, outcome.into()).await;
        let release_result = self.store.release_orchestration_lock(&wi).await;
        match commit_result {
            Ok(()) => {
                if status.is_terminal() {
                    session.complete(status);
                }
                release_result?;
                Ok(())
            }
            Err(e) => {
                warn!(instance = %result.instance_id, error = %e, "commit failed, abandoning turn");
                let _ = self.store.abandon_orchestration(&wi).await;
                let _ = self.store.release_orchestration_lock(&wi).await;
                Err(e.into())
            }
        }
    }

    /// Continue-as-new: re-enqueue the replaced state as a fresh turn on
    /// the same lock, renewing it when close to expiry, without committing.
    async fn redispatch_as_new(
        &self,
        session: Session,
        mut state: dt_core::RuntimeState,
    ) -> Result<(), HubError> {
        let mut wi = session.work_item().clone();

        if let Some(expires_at) = wi.lock_expires_at {
            let window = chrono::Duration::from_std(self.options.lock_renewal_window)
                .unwrap_or_else(|_| chrono::Duration::seconds(60));
            if expires_at - self.clock.now_utc() < window {
                wi.lock_expires_at = Some(self.store.renew_orchestration_lock(&wi).await?);
            }
        }

        // The fresh generation's start events become the next turn's
        // messages; nothing is committed until the chain settles.
        let events = std::mem::take(&mut state.new_events);
        wi.instance = state.instance.clone();
        wi.name = state.name.clone();
        wi.replay_history = Vec::new();
        wi.new_messages = events
            .into_iter()
            .filter(|e| !matches!(e.kind, EventKind::OrchestratorStarted))
            .map(|event| {
                WorkMessage::for_instance(TaskMessage::new(state.instance.clone(), event))
            })
            .collect();

        let instance_id = wi.instance.instance_id.clone();
        debug!(instance = %instance_id, "continue-as-new, re-dispatching without commit");
        self.dispatch_orchestration(wi).await
    }

    /// Register a session for a work item and push the turn onto the work
    /// queue.
    async fn dispatch_orchestration(&self, wi: OrchestratorWorkItem) -> Result<(), HubError> {
        let instance_id = wi.instance.instance_id.clone();
        if self.router.is_registered(&instance_id) {
            // A zombie session from an expired lock; the store re-locked the
            // instance, so the old dispatch is dead.
            warn!(instance = %instance_id, "evicting stale session before re-dispatch");
            if let Some(old) = self.pending_orchestrations.lock().remove(&instance_id) {
                old.release(&self.router);
            } else {
                self.router.remove(&instance_id);
            }
        }
        let mut session = match Session::new(wi.clone(), &self.router, self.clock.now_utc()) {
            Ok(Some(session)) => session,
            Ok(None) => {
                // Everything filtered out: nothing to run.
                debug!(instance = %instance_id, "turn empty after filtering, releasing lock");
                self.store.release_orchestration_lock(&wi).await?;
                return Ok(());
            }
            Err(e) => {
                warn!(instance = %instance_id, error = %e, "instance already in flight, abandoning");
                self.store.abandon_orchestration(&wi).await?;
                self.store.release_orchestration_lock(&wi).await?;
                return Ok(());
            }
        };

        let messages = match session.take_inbound() {
            Some(rx) => rx,
            None => return Err(HubError::InvalidArgument("session channel already taken".into())),
        };
        let item = session.work_item().clone();
        self.pending_orchestrations.lock().insert(instance_id.clone(), session);

        let turn = DispatchedWorkItem::Orchestrator(OrchestratorTurn { item, messages });
        if self.work_tx.send(turn).await.is_err() {
            // Queue closed: shutting down. Put the work back.
            self.abandon_pending_orchestration(&instance_id).await;
            return Err(HubError::Canceled);
        }
        Ok(())
    }

    /// Worker-requested abandon (AbortWorkItem): drop the turn without
    /// committing; the store will retry it.
    pub async fn abandon_orchestrator_task(&self, instance_id: &str) {
        debug!(instance = instance_id, "worker aborted turn, abandoning");
        self.abandon_pending_orchestration(instance_id).await;
    }

    async fn abandon_pending_orchestration(&self, instance_id: &str) {
        let session = self.pending_orchestrations.lock().remove(instance_id);
        if let Some(session) = session {
            session.release(&self.router);
            let wi = session.work_item().clone();
            if let Err(e) = self.store.abandon_orchestration(&wi).await {
                warn!(instance = instance_id, error = %e, "abandon failed");
            }
            if let Err(e) = self.store.release_orchestration_lock(&wi).await {
                warn!(instance = instance_id, error = %e, "lock release failed");
            }
        }
    }

    /// Orchestration producer: latch-gated lock-and-dispatch loop.
    async fn orchestration_loop(self: Arc<Self>, ct: CancellationToken) {
        loop {
            if self.readers_available.wait(&ct).await.is_err() {
                break;
            }
            let wi = match self.store.lock_next_orchestration(&ct).await {
                Ok(wi) => wi,
                Err(StoreError::Canceled) => break,
                Err(e) => {
                    warn!(error = %e, "orchestration dequeue failed");
                    tokio::time::sleep(PRODUCER_RETRY_DELAY).await;
                    continue;
                }
            };
            let wi = match self.park_early_timers(wi).await {
                Some(wi) => wi,
                None => continue,
            };
            match self.dispatch_orchestration(wi).await {
                Ok(()) => {}
                Err(HubError::Canceled) => break,
                Err(e) => warn!(error = %e, "orchestration dispatch failed"),
            }
        }
        debug!("orchestration producer stopped");
    }

    /// Hop mechanism for stores with bounded defer windows: a timer
    /// delivered before its due time goes back to the store instead of
    /// into the turn.
    async fn park_early_timers(&self, mut wi: OrchestratorWorkItem) -> Option<OrchestratorWorkItem> {
        let now = self.clock.now_utc();
        let (early, due): (Vec<WorkMessage>, Vec<WorkMessage>) = wi
            .new_messages
            .drain(..)
            .partition(|m| m.message.visible_at().is_some_and(|at| at > now));
        wi.new_messages = due;

        for msg in early {
            debug!(instance = wi.instance_id(), "re-deferring early timer delivery");
            if let Err(e) = self.store.append_message(msg.message).await {
                warn!(error = %e, "re-defer failed");
            }
        }
        if wi.new_messages.is_empty() {
            if let Err(e) = self.store.release_orchestration_lock(&wi).await {
                warn!(error = %e, "lock release failed");
            }
            return None;
        }
        Some(wi)
    }

    /// Activity producer: latch-gated dequeue into the shared work queue.
    async fn activity_loop(self: Arc<Self>, ct: CancellationToken) {
        loop {
            if self.readers_available.wait(&ct).await.is_err() {
                break;
            }
            let wi = match self.store.lock_next_activity(&ct).await {
                Ok(wi) => wi,
                Err(StoreError::Canceled) => break,
                Err(e) => {
                    warn!(error = %e, "activity dequeue failed");
                    tokio::time::sleep(PRODUCER_RETRY_DELAY).await;
                    continue;
                }
            };
            self.pending_activities.lock().insert(wi.dispatch_id(), wi.clone());
            if self.work_tx.send(DispatchedWorkItem::Activity(wi.clone())).await.is_err() {
                self.pending_activities.lock().remove(&wi.dispatch_id());
                if let Err(e) = self.store.abandon_activity(&wi).await {
                    warn!(error = %e, "activity abandon failed");
                }
                break;
            }
        }
        debug!("activity producer stopped");
    }

    /// Abandon everything in flight and stop the loops. Idempotent.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown.cancel();

        let sessions: Vec<Session> = {
            let mut pending = self.pending_orchestrations.lock();
            pending.drain().map(|(_, s)| s).collect()
        };
        for session in sessions {
            session.release(&self.router);
            let wi = session.work_item().clone();
            if let Err(e) = self.store.abandon_orchestration(&wi).await {
                warn!(instance = wi.instance_id(), error = %e, "abandon failed during dispose");
            }
            if let Err(e) = self.store.release_orchestration_lock(&wi).await {
                warn!(instance = wi.instance_id(), error = %e, "release failed during dispose");
            }
        }

        let activities: Vec<ActivityWorkItem> = {
            let mut pending = self.pending_activities.lock();
            pending.drain().map(|(_, wi)| wi).collect()
        };
        for wi in activities {
            if let Err(e) = self.store.abandon_activity(&wi).await {
                warn!(dispatch = %wi.dispatch_id(), error = %e, "activity abandon failed during dispose");
            }
        }
        info!("hub dispatcher disposed");
    }

    /// Current UTC time from the hub's clock.
    pub fn now(&self) -> chrono::DateTime<Utc> {
        self.clock.now_utc()
    }
}

/// A connected worker's view of the work queue. Multiple streams may each
/// consume concurrently; each item goes to exactly one stream.
pub struct WorkItemStream<C: Clock = SystemClock> {
    hub: Arc<HubDispatcher<C>>,
    ct: CancellationToken,
}

impl<C: Clock> WorkItemStream<C> {
    /// Next work item, or `None` on hub shutdown.
    pub async fn next(&mut self) -> Option<DispatchedWorkItem> {
        let queue = Arc::clone(&self.hub.work_rx);
        let mut rx = tokio::select! {
            guard = queue.lock() => guard,
            _ = self.ct.cancelled() => return None,
        };
        tokio::select! {
            item = rx.recv() => item,
            _ = self.ct.cancelled() => None,
        }
    }

    /// Cancel this stream without dropping it (disconnect).
    pub fn disconnect(&self) {
        self.ct.cancel();
    }
}

impl<C: Clock> Drop for WorkItemStream<C> {
    fn drop(&mut self) {
        if self.hub.reader_count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.hub.readers_available.reset();
            debug!("last worker stream disconnected, dequeue parked");
        }
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
