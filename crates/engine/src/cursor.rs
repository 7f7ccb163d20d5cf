// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The orchestration cursor: replay and execution of one turn.
//!
//! The cursor replays committed history to rebuild the user coroutine's
//! in-memory state, binds pending futures to inbound completion events,
//! enforces determinism, and collects the turn's outbound actions. The
//! user future is polled manually with a no-op waker after every event:
//! suspension only happens on cursor-provided futures, so readiness is
//! always produced by an event the cursor just processed.

use crate::context::OrchestrationContext;
use crate::error::{OrchestrationError, WorkerError};
use crate::registry::Registry;
use crate::task_future::{resolve, SharedSlot};
use chrono::{DateTime, Utc};
use dt_core::{
    ActionKind, CompletionOutcome, EventKind, HistoryEvent, OrchestrationInstance,
    OrchestratorAction, OrchestratorWorkItem, TaskFailureDetails, TaskMessage, TaskName,
};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{debug, warn};

/// Shared turn state between the cursor and the user-facing context.
pub(crate) struct TurnState {
    pub instance: OrchestrationInstance,
    pub replaying: bool,
    pub sequence_id: i32,
    pub current_time: DateTime<Utc>,
    pub guid_counter: u32,
    /// Actions emitted by user code, keyed by event id. Entries stay until
    /// their completion arrives; `consumed` marks replayed echoes.
    pub pending: BTreeMap<i32, PendingAction>,
    /// Event ids whose scheduled echo has been observed; used to tell
    /// duplicate completions from nondeterminism.
    pub echoed: HashSet<i32>,
    /// External-event waiters, FIFO per name.
    pub waiters: HashMap<String, VecDeque<SharedSlot>>,
    /// Buffered external events in global arrival order.
    pub buffered: Vec<BufferedEvent>,
    pub custom_status: Option<String>,
    pub pending_completion: Option<PendingCompletion>,
    /// External events preserved across continue-as-new.
    pub carryover: Vec<HistoryEvent>,
    pub input: Option<Value>,
}

pub(crate) struct BufferedEvent {
    pub name: String,
    pub input: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

pub(crate) struct PendingAction {
    pub kind: ActionKind,
    pub slot: Option<SharedSlot>,
    pub consumed: bool,
}

pub(crate) enum PendingCompletion {
    ContinueAsNew { input: Option<Value>, preserve: bool },
    Terminated { reason: Option<String> },
}

impl TurnState {
    pub fn next_id(&mut self) -> i32 {
        let id = self.sequence_id;
        self.sequence_id += 1;
        id
    }

    /// Dequeue the oldest buffered event with this name.
    pub fn take_buffered_event(&mut self, name: &str) -> Option<Option<Value>> {
        let index = self.buffered.iter().position(|e| e.name == name)?;
        Some(self.buffered.remove(index).input)
    }

    fn preserve_mode(&self) -> bool {
        matches!(
            self.pending_completion,
            Some(PendingCompletion::ContinueAsNew { preserve: true, .. })
        )
    }
}

/// What one turn produced.
#[derive(Debug)]
pub enum TurnOutcome {
    /// The turn's ordered action batch plus the custom status to publish.
    Actions { actions: Vec<OrchestratorAction>, custom_status: Option<String> },
    /// The user code aborted the work item; the hub must abandon it
    /// without committing.
    Abort,
}

type UserFuture = Pin<Box<dyn Future<Output = Result<Value, OrchestrationError>>>>;

/// Replay/execution loop for one orchestration turn. Single-threaded; the
/// whole cursor lives on the thread driving the turn.
pub struct OrchestrationCursor {
    registry: Arc<Registry>,
    state: Rc<RefCell<TurnState>>,
    user_future: Option<UserFuture>,
    user_result: Option<Result<Value, OrchestrationError>>,
    violation: Option<WorkerError>,
}

impl OrchestrationCursor {
    pub fn new(registry: Arc<Registry>, item: &OrchestratorWorkItem) -> Self {
        let state = TurnState {
            instance: item.instance.clone(),
            replaying: false,
            sequence_id: 0,
            current_time: DateTime::<Utc>::MIN_UTC,
            guid_counter: 0,
            pending: BTreeMap::new(),
            echoed: HashSet::new(),
            waiters: HashMap::new(),
            buffered: Vec::new(),
            custom_status: None,
            pending_completion: None,
            carryover: Vec::new(),
            input: None,
        };
        Self {
            registry,
            state: Rc::new(RefCell::new(state)),
            user_future: None,
            user_result: None,
            violation: None,
        }
    }

    /// Rebuild in-memory state from committed history. Outbound emission
    /// is naturally suppressed: actions re-created by the user code are
    /// matched against their echoes and marked consumed.
    pub fn replay(&mut self, history: &[HistoryEvent]) {
        self.state.borrow_mut().replaying = true;
        for event in history {
            self.handle_event(event);
        }
        self.state.borrow_mut().replaying = false;
    }

    /// Process one inbound message of the current turn.
    pub fn handle_message(&mut self, msg: &TaskMessage) {
        self.handle_event(&msg.event);
    }

    /// Has the turn's outcome been decided?
    pub fn turn_done(&self) -> bool {
        self.violation.is_some()
            || self.user_result.is_some()
            || self.state.borrow().pending_completion.is_some()
    }

    fn handle_event(&mut self, event: &HistoryEvent) {
        {
            let mut state = self.state.borrow_mut();
            if event.timestamp > state.current_time {
                state.current_time = event.timestamp;
            }
        }
        if self.violation.is_some() {
            return;
        }

        match &event.kind {
            EventKind::ExecutionStarted { name, input, .. } => {
                self.start_coroutine(name, input.clone());
            }

            EventKind::ExecutionTerminated { reason } => {
                let mut state = self.state.borrow_mut();
                // Termination wins over event preservation.
                state.pending_completion =
                    Some(PendingCompletion::Terminated { reason: reason.clone() });
            }

            kind if kind.is_scheduled_echo() => self.handle_echo(event.event_id, kind),

            EventKind::TaskCompleted { scheduled_id, result } => {
                self.resolve_completion(*scheduled_id, Ok(result.clone().unwrap_or(Value::Null)));
            }
            EventKind::TaskFailed { scheduled_id, failure } => {
                self.resolve_completion(*scheduled_id, Err(failure.clone()));
            }
            EventKind::SubOrchestrationCompleted { scheduled_id, result } => {
                self.resolve_completion(*scheduled_id, Ok(result.clone().unwrap_or(Value::Null)));
            }
            EventKind::SubOrchestrationFailed { scheduled_id, failure } => {
                self.resolve_completion(*scheduled_id, Err(failure.clone()));
            }
            EventKind::TimerFired { scheduled_id, .. } => {
                self.resolve_completion(*scheduled_id, Ok(Value::Null));
            }

            EventKind::EventRaised { name, input } => {
                let mut state = self.state.borrow_mut();
                if state.preserve_mode() {
                    state.carryover.push(event.clone());
                } else if let Some(slot) =
                    state.waiters.get_mut(name).and_then(VecDeque::pop_front)
                {
                    resolve(&slot, Ok(input.clone().unwrap_or(Value::Null)));
                } else {
                    state.buffered.push(BufferedEvent {
                        name: name.clone(),
                        input: input.clone(),
                        timestamp: event.timestamp,
                    });
                }
            }

            // Turn markers and status flips only advance the clock here;
            // suspension gating happens hub-side.
            EventKind::OrchestratorStarted
            | EventKind::OrchestratorCompleted
            | EventKind::ExecutionSuspended { .. }
            | EventKind::ExecutionResumed { .. }
            | EventKind::ContinueAsNew { .. }
            | EventKind::ExecutionCompleted { .. }
            | EventKind::EventSent { .. }
            | EventKind::Generic { .. } => {}

            EventKind::TaskScheduled { .. }
            | EventKind::TimerCreated { .. }
            | EventKind::SubOrchestrationCreated { .. } => {
                // Covered by the is_scheduled_echo arm; unreachable here.
            }
        }

        self.poll_user();
    }

    /// A replayed echo of this cursor's own past emission. The matching
    /// pending action must exist with the same shape, or the orchestrator
    /// has diverged from its history.
    fn handle_echo(&mut self, event_id: i32, kind: &EventKind) {
        let mut state = self.state.borrow_mut();
        let Some(action) = state.pending.get_mut(&event_id) else {
            drop(state);
            self.fail_nondeterministic(format!(
                "history expects a {} action with id {}, but the orchestrator produced none",
                kind.label(),
                event_id
            ));
            return;
        };
        if !echo_matches(&action.kind, kind) {
            let produced = action_label(&action.kind);
            drop(state);
            self.fail_nondeterministic(format!(
                "history expects {} for id {}, but the orchestrator produced {}",
                kind.label(),
                event_id,
                produced
            ));
            return;
        }
        action.consumed = true;
        let fire_and_forget = action.slot.is_none();
        if fire_and_forget {
            state.pending.remove(&event_id);
        }
        state.echoed.insert(event_id);
    }

    fn resolve_completion(&mut self, scheduled_id: i32, result: Result<Value, TaskFailureDetails>) {
        let mut state = self.state.borrow_mut();
        match state.pending.remove(&scheduled_id) {
            Some(action) => {
                if let Some(slot) = action.slot {
                    resolve(&slot, result);
                }
                state.echoed.insert(scheduled_id);
            }
            None if state.echoed.contains(&scheduled_id) => {
                // At-least-once delivery: a second completion for the same
                // scheduled id is dropped.
                debug!(scheduled_id, "ignoring duplicate completion");
            }
            None => {
                drop(state);
                self.fail_nondeterministic(format!(
                    "completion references scheduled id {} that was never produced",
                    scheduled_id
                ));
            }
        }
    }

    fn start_coroutine(&mut self, name: &TaskName, input: Option<Value>) {
        if self.user_future.is_some() || self.user_result.is_some() {
            return;
        }
        let Some(factory) = self.registry.find_orchestrator(name) else {
            self.violation = Some(WorkerError::Unregistered(name.to_string()));
            return;
        };
        self.state.borrow_mut().input = input;
        let ctx = OrchestrationContext::new(Rc::clone(&self.state));
        self.user_future = Some(factory(ctx));
    }

    /// Single-threaded cooperative step: run the user future until it
    /// parks on a cursor-provided primitive again.
    fn poll_user(&mut self) {
        if self.violation.is_some() || self.user_result.is_some() {
            return;
        }
        let Some(future) = self.user_future.as_mut() else { return };
        let waker = futures_util::task::noop_waker();
        let mut cx = Context::from_waker(&waker);
        if let Poll::Ready(result) = future.as_mut().poll(&mut cx) {
            self.user_result = Some(result);
            self.user_future = None;
        }
    }

    fn fail_nondeterministic(&mut self, message: String) {
        warn!(instance = %self.state.borrow().instance.instance_id, %message, "determinism violation");
        self.violation = Some(WorkerError::Nondeterminism(message));
    }

    /// Close the turn and produce its action batch, with completion
    /// arbitration in priority order: continue-as-new, then the user
    /// result, then termination, then "still running".
    pub fn finish(self) -> TurnOutcome {
        let mut state = self.state.borrow_mut();
        let custom_status = state.custom_status.take();

        if let Some(violation) = &self.violation {
            let id = state.next_id();
            return TurnOutcome::Actions {
                actions: vec![complete_action(
                    id,
                    CompletionOutcome::failed(violation.failure_details()),
                )],
                custom_status,
            };
        }

        let completion = state.pending_completion.take();
        if let Some(PendingCompletion::ContinueAsNew { input, preserve }) = completion {
            let mut carryover = Vec::new();
            if preserve {
                for event in state.buffered.drain(..) {
                    carryover.push(HistoryEvent::system(
                        event.timestamp,
                        EventKind::EventRaised { name: event.name, input: event.input },
                    ));
                }
                carryover.append(&mut state.carryover);
            }
            let id = state.next_id();
            return TurnOutcome::Actions {
                actions: vec![complete_action(
                    id,
                    CompletionOutcome::continued_as_new(input, carryover),
                )],
                custom_status,
            };
        }

        match self.user_result {
            Some(Ok(result)) => {
                let mut actions = unconsumed_actions(&state);
                let id = state.next_id();
                actions.push(complete_action(id, CompletionOutcome::completed(Some(result))));
                TurnOutcome::Actions { actions, custom_status }
            }
            Some(Err(OrchestrationError::AbortWorkItem)) => TurnOutcome::Abort,
            Some(Err(OrchestrationError::Failure(details))) => {
                let mut actions = unconsumed_actions(&state);
                let id = state.next_id();
                actions.push(complete_action(id, CompletionOutcome::failed(details)));
                TurnOutcome::Actions { actions, custom_status }
            }
            None => {
                if let Some(PendingCompletion::Terminated { reason }) = completion {
                    let id = state.next_id();
                    return TurnOutcome::Actions {
                        actions: vec![complete_action(
                            id,
                            CompletionOutcome::terminated(reason.map(Value::String)),
                        )],
                        custom_status,
                    };
                }
                // Still running: emit this turn's new actions and wait for
                // their completions in a later turn.
                TurnOutcome::Actions { actions: unconsumed_actions(&state), custom_status }
            }
        }
    }
}

/// This turn's newly produced actions, in id order.
fn unconsumed_actions(state: &TurnState) -> Vec<OrchestratorAction> {
    state
        .pending
        .iter()
        .filter(|(_, action)| !action.consumed)
        .map(|(id, action)| OrchestratorAction { id: *id, kind: action.kind.clone() })
        .collect()
}

fn complete_action(id: i32, outcome: CompletionOutcome) -> OrchestratorAction {
    OrchestratorAction { id, kind: ActionKind::CompleteOrchestration { outcome } }
}

fn action_label(kind: &ActionKind) -> &'static str {
    match kind {
        ActionKind::ScheduleTask { .. } => "schedule-task",
        ActionKind::CreateTimer { .. } => "create-timer",
        ActionKind::CreateSubOrchestration { .. } => "create-sub-orchestration",
        ActionKind::SendEvent { .. } => "send-event",
        ActionKind::CompleteOrchestration { .. } => "complete-orchestration",
    }
}

/// Does a replayed history echo match the action the user code produced?
fn echo_matches(action: &ActionKind, echo: &EventKind) -> bool {
    match (action, echo) {
        (
            ActionKind::ScheduleTask { name: a, .. },
            EventKind::TaskScheduled { name: b, .. },
        ) => a == b,
        (ActionKind::CreateTimer { .. }, EventKind::TimerCreated { .. }) => true,
        (
            ActionKind::CreateSubOrchestration { name: a, instance_id: ia, .. },
            EventKind::SubOrchestrationCreated { name: b, instance_id: ib, .. },
        ) => a == b && ia == ib,
        (
            ActionKind::SendEvent { target_instance_id: ta, name: a, .. },
            EventKind::EventSent { target_instance_id: tb, name: b, .. },
        ) => ta == tb && a == b,
        _ => false,
    }
}

#[cfg(test)]
#[path = "cursor_tests.rs"]
mod tests;
