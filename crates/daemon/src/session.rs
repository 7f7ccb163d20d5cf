// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session: hub-side state for one locked orchestration turn.
//!
//! A session owns the turn's state snapshot, the inbound channel the
//! worker drains, and the completion latch observers can wait on. Message
//! filtering happens here: stale-generation messages, duplicate starts,
//! and duplicate completions are dropped before the worker ever sees
//! them, preventing split-brain after continue-as-new.

use crate::router::{MessageRouter, RouterError};
use chrono::{DateTime, Utc};
use dt_core::{
    EventKind, HistoryEvent, OrchestrationStatus, OrchestratorWorkItem, RuntimeState, WorkMessage,
};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

/// One in-flight orchestration turn.
pub struct Session {
    work_item: OrchestratorWorkItem,
    /// Turn snapshot: replay plus this turn's accepted messages applied.
    state: RuntimeState,
    /// Carry-over messages routed into the turn after dispatch.
    routed: Vec<WorkMessage>,
    inbound: Option<mpsc::UnboundedReceiver<WorkMessage>>,
    completion_tx: Option<oneshot::Sender<OrchestrationStatus>>,
    completion_rx: Option<oneshot::Receiver<OrchestrationStatus>>,
}

impl Session {
    /// Build a session for a locked work item, registering its dispatcher
    /// with the router. The work item's messages are filtered; returns
    /// `None` when nothing survives filtering (the caller should release
    /// the lock instead of dispatching an empty turn).
    pub fn new(
        mut work_item: OrchestratorWorkItem,
        router: &MessageRouter,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, RouterError> {
        let mut state =
            RuntimeState::from_history(work_item.instance.clone(), work_item.replay_history.clone());

        state.add_event(HistoryEvent::system(now, EventKind::OrchestratorStarted));

        // Filter against the evolving snapshot so a duplicate inside the
        // same batch is caught too.
        let messages = std::mem::take(&mut work_item.new_messages);
        let mut accepted = Vec::new();
        for msg in messages {
            if let Some(reason) = rejects(&state, &msg.message) {
                warn!(instance = work_item.instance_id(), %reason, "dropping inbound message");
                continue;
            }
            state.add_event(msg.message.event.clone());
            accepted.push(msg);
        }
        if accepted.is_empty() {
            return Ok(None);
        }

        let mut iter = accepted.iter().cloned();
        // accepted is non-empty; seed with the first, deliver the rest.
        let first = match iter.next() {
            Some(first) => first,
            None => return Ok(None),
        };
        let rx = router.initialize(first)?;
        for msg in iter {
            router.deliver(&work_item.instance.instance_id, msg);
        }

        work_item.new_messages = accepted;
        let (completion_tx, completion_rx) = oneshot::channel();
        Ok(Some(Self {
            work_item,
            state,
            routed: Vec::new(),
            inbound: Some(rx),
            completion_tx: Some(completion_tx),
            completion_rx: Some(completion_rx),
        }))
    }

    pub fn work_item(&self) -> &OrchestratorWorkItem {
        &self.work_item
    }

    pub fn instance_id(&self) -> &str {
        self.work_item.instance_id()
    }

    /// Committed history in order, then ends. Restartable across replays
    /// only by building a new session.
    pub fn history(&self) -> impl Iterator<Item = &HistoryEvent> {
        self.work_item.replay_history.iter()
    }

    /// The turn's inbound reader, handed to exactly one worker.
    pub fn take_inbound(&mut self) -> Option<mpsc::UnboundedReceiver<WorkMessage>> {
        self.inbound.take()
    }

    /// One-shot future resolved when the execution completes.
    pub fn take_completion(&mut self) -> Option<oneshot::Receiver<OrchestrationStatus>> {
        self.completion_rx.take()
    }

    /// Record a message that was routed into the in-flight turn; its event
    /// joins the turn's history at completion time.
    pub fn record_routed(&mut self, msg: WorkMessage) {
        self.routed.push(msg);
    }

    /// Fold the turn's state and routed messages into the state the
    /// applier runs against.
    pub fn turn_state(&self) -> RuntimeState {
        let mut state = self.state.clone();
        for msg in &self.routed {
            if let Some(reason) = rejects(&state, &msg.message) {
                warn!(instance = self.instance_id(), %reason, "dropping routed message");
                continue;
            }
            state.add_event(msg.message.event.clone());
        }
        state
    }

    /// Resolve the completion latch.
    pub fn complete(&mut self, status: OrchestrationStatus) {
        if let Some(tx) = self.completion_tx.take() {
            let _ = tx.send(status);
        }
    }

    /// Unregister the session's dispatcher.
    pub fn release(&self, router: &MessageRouter) {
        router.remove(self.instance_id());
    }
}

/// Why an inbound message must not enter this turn, if any.
///
/// On top of the state-level checks (stale execution id, duplicate
/// start/complete), a completion whose scheduled id already completed in
/// this history is dropped: at-least-once delivery makes duplicates
/// routine.
fn rejects(state: &RuntimeState, msg: &dt_core::TaskMessage) -> Option<String> {
    if let Some(reason) = state.rejects_inbound(msg) {
        return Some(reason);
    }
    if let Some(scheduled_id) = msg.event.kind.completion_scheduled_id() {
        let already_completed = state
            .past_events
            .iter()
            .chain(state.new_events.iter())
            .any(|e| e.kind.completion_scheduled_id() == Some(scheduled_id));
        if already_completed {
            return Some(format!("duplicate completion for scheduled id {}", scheduled_id));
        }
    }
    None
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
