// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activity execution.
//!
//! Runs one activity invocation and reports success or failure. Delivery
//! is at-least-once: a crash after the side effect but before the
//! completion lands re-runs the activity, so user activities must be
//! idempotent.

use crate::registry::{ActivityContext, Registry};
use dt_core::{ActivityWorkItem, TaskFailureDetails};
use dt_wire::{ActivityResult, TaskError};
use std::sync::Arc;
use tracing::debug;

/// Stateless runner for activity work items.
pub struct ActivityRunner;

impl ActivityRunner {
    /// Invoke the named activity and package the outcome.
    pub async fn run(registry: &Arc<Registry>, wi: &ActivityWorkItem) -> ActivityResult {
        let ctx = ActivityContext {
            instance_id: wi.instance.instance_id.clone(),
            task_id: wi.task_id,
            input: wi.input.clone(),
        };
        let outcome = match registry.find_activity(&wi.name) {
            Some(activity) => activity(ctx).await,
            None => Err(TaskFailureDetails::non_retriable(
                "UnregisteredTask",
                format!("no activity registered as {}", wi.name),
            )),
        };
        debug!(
            dispatch = %wi.dispatch_id(),
            name = %wi.name,
            ok = outcome.is_ok(),
            "activity finished"
        );
        match outcome {
            Ok(result) => ActivityResult {
                instance_id: wi.instance.instance_id.clone(),
                task_id: wi.task_id,
                result: Some(result),
                failure: None,
            },
            Err(details) => ActivityResult {
                instance_id: wi.instance.instance_id.clone(),
                task_id: wi.task_id,
                result: None,
                failure: Some(TaskError::from(&details)),
            },
        }
    }
}

#[cfg(test)]
#[path = "activity_tests.rs"]
mod tests;
