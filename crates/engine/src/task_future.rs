// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The awaitable half of a pending action.
//!
//! A `TaskFuture` polls a shared slot the cursor resolves when the
//! matching completion event arrives. There is no waker machinery: the
//! cursor re-polls the orchestrator future after every message it
//! processes, so readiness is always observed.

use dt_core::TaskFailureDetails;
use serde_json::Value;
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

/// Shared result slot between the cursor and one `TaskFuture`.
#[derive(Debug, Default)]
pub(crate) struct Slot {
    result: Option<Result<Value, TaskFailureDetails>>,
}

pub(crate) type SharedSlot = Rc<RefCell<Slot>>;

pub(crate) fn new_slot() -> SharedSlot {
    Rc::new(RefCell::new(Slot::default()))
}

pub(crate) fn resolve(slot: &SharedSlot, result: Result<Value, TaskFailureDetails>) {
    let mut slot = slot.borrow_mut();
    if slot.result.is_none() {
        slot.result = Some(result);
    }
}

/// Future for one scheduled activity, sub-orchestration, timer, or
/// external event. Resolves to the recorded result.
pub struct TaskFuture {
    slot: SharedSlot,
}

impl TaskFuture {
    pub(crate) fn new(slot: SharedSlot) -> Self {
        Self { slot }
    }
}

impl Future for TaskFuture {
    type Output = Result<Value, TaskFailureDetails>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.slot.borrow_mut().result.take() {
            Some(result) => Poll::Ready(result),
            None => Poll::Pending,
        }
    }
}

#[cfg(test)]
#[path = "task_future_tests.rs"]
mod tests;
