// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The orchestration context: the API user orchestrator code programs
//! against.
//!
//! Everything here must be deterministic under replay. Time comes from the
//! cursor's message-derived clock, GUIDs from the deterministic
//! derivation, and suspension is only legal on the futures this context
//! hands out.

use crate::cursor::{PendingAction, PendingCompletion, TurnState};
use crate::task_future::{new_slot, resolve, TaskFuture};
use chrono::{DateTime, Utc};
use dt_core::{deterministic_guid, ActionKind, TaskFailureDetails, TaskName};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use uuid::Uuid;

/// Handle to one orchestration turn, cloneable into user futures.
#[derive(Clone)]
pub struct OrchestrationContext {
    state: Rc<RefCell<TurnState>>,
}

impl OrchestrationContext {
    pub(crate) fn new(state: Rc<RefCell<TurnState>>) -> Self {
        Self { state }
    }

    /// The orchestration's instance id.
    pub fn instance_id(&self) -> String {
        self.state.borrow().instance.instance_id.clone()
    }

    /// Deterministic current UTC time: the high-water mark of processed
    /// message timestamps, stable across replays.
    pub fn current_time(&self) -> DateTime<Utc> {
        self.state.borrow().current_time
    }

    /// True while the cursor is replaying committed history.
    pub fn is_replaying(&self) -> bool {
        self.state.borrow().replaying
    }

    /// The orchestration input, deserialized.
    pub fn input_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, TaskFailureDetails> {
        let input = self.state.borrow().input.clone().unwrap_or(Value::Null);
        serde_json::from_value(input)
            .map_err(|e| TaskFailureDetails::non_retriable("InputDeserialization", e.to_string()))
    }

    /// Replay-stable GUID.
    pub fn new_guid(&self) -> Uuid {
        let mut state = self.state.borrow_mut();
        let counter = state.guid_counter;
        state.guid_counter += 1;
        deterministic_guid(&state.instance.instance_id, state.current_time, counter)
    }

    /// Schedule an activity and await its result.
    pub fn call_activity(
        &self,
        name: impl Into<TaskName>,
        input: impl Into<Option<Value>>,
    ) -> TaskFuture {
        self.schedule_awaited(ActionKind::ScheduleTask {
            name: name.into(),
            input: input.into(),
        })
    }

    /// Schedule a child orchestration and await its result. When
    /// `instance_id` is `None` a replay-stable child id is derived.
    pub fn call_sub_orchestrator(
        &self,
        name: impl Into<TaskName>,
        instance_id: Option<String>,
        input: impl Into<Option<Value>>,
    ) -> TaskFuture {
        let child_id = instance_id.unwrap_or_else(|| self.new_guid().to_string());
        self.schedule_awaited(ActionKind::CreateSubOrchestration {
            name: name.into(),
            instance_id: child_id,
            input: input.into(),
            tags: indexmap::IndexMap::new(),
        })
    }

    /// Durable timer resolving (with null) at `fire_at`.
    pub fn create_timer_at(&self, fire_at: DateTime<Utc>) -> TaskFuture {
        self.schedule_awaited(ActionKind::CreateTimer { fire_at })
    }

    /// Durable timer resolving after `delay` of orchestration time.
    pub fn create_timer(&self, delay: chrono::Duration) -> TaskFuture {
        let fire_at = self.current_time() + delay;
        self.create_timer_at(fire_at)
    }

    /// Fire-and-forget event to another orchestration.
    pub fn send_event(
        &self,
        target_instance_id: impl Into<String>,
        name: impl Into<String>,
        input: impl Into<Option<Value>>,
    ) {
        let mut state = self.state.borrow_mut();
        let id = state.next_id();
        state.pending.insert(
            id,
            PendingAction {
                kind: ActionKind::SendEvent {
                    target_instance_id: target_instance_id.into(),
                    name: name.into(),
                    input: input.into(),
                },
                slot: None,
                consumed: false,
            },
        );
    }

    /// Await the next external event with this name.
    ///
    /// Matching is first-registered-first-resolved: waiters for a name
    /// form a FIFO queue, and inbound events for that name resolve them
    /// in registration order (already-buffered events are consumed first,
    /// in arrival order). Two concurrent waits on the same name therefore
    /// receive the first and second event respectively, and replay
    /// reproduces the same pairing because both orders are recorded in
    /// history. Payloads are raw JSON; every call site sharing a name must
    /// agree on the payload shape, since the value is only deserialized at
    /// the caller.
    pub fn wait_for_external_event(&self, name: impl Into<String>) -> TaskFuture {
        let name = name.into();
        let mut state = self.state.borrow_mut();
        let slot = new_slot();
        if let Some(input) = state.take_buffered_event(&name) {
            resolve(&slot, Ok(input.unwrap_or(Value::Null)));
        } else {
            state.waiters.entry(name).or_default().push_back(Rc::clone(&slot));
        }
        TaskFuture::new(slot)
    }

    /// Restart this orchestration with fresh history. When
    /// `preserve_events` is set, buffered and still-arriving external
    /// events carry over to the next generation. Further outbound work in
    /// this turn is ignored.
    pub fn continue_as_new(&self, input: impl Into<Option<Value>>, preserve_events: bool) {
        let mut state = self.state.borrow_mut();
        if state.pending_completion.is_none() {
            state.pending_completion = Some(PendingCompletion::ContinueAsNew {
                input: input.into(),
                preserve: preserve_events,
            });
        }
    }

    /// Publish a custom status string alongside the next commit.
    pub fn set_custom_status(&self, status: impl Into<String>) {
        self.state.borrow_mut().custom_status = Some(status.into());
    }

    fn schedule_awaited(&self, kind: ActionKind) -> TaskFuture {
        let mut state = self.state.borrow_mut();
        let id = state.next_id();
        let slot = new_slot();
        state
            .pending
            .insert(id, PendingAction { kind, slot: Some(Rc::clone(&slot)), consumed: false });
        TaskFuture::new(slot)
    }
}
