// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The action applier: a pure transform from a worker's action batch to
//! history events and outbound messages.
//!
//! Runs under the per-instance lock on the hub side. Nothing here touches
//! the store; the caller commits the outcome atomically.

use crate::action::{ActionKind, OrchestratorAction};
use crate::failure::TaskFailureDetails;
use crate::history::{EventKind, HistoryEvent};
use crate::instance::{OrchestrationInstance, ParentInfo};
use crate::message::TaskMessage;
use crate::state::RuntimeState;
use crate::status::OrchestrationStatus;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Validation failures surfaced to the worker as InvalidArgument.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("runtime state has an empty instance id")]
    MissingInstance,

    #[error("action {0} schedules a task with an empty name")]
    EmptyTaskName(i32),

    #[error("action {0} targets an empty instance id")]
    EmptyTarget(i32),
}

/// Result of applying one turn's actions.
#[derive(Debug)]
pub struct ApplyOutcome {
    /// The updated (or, after continue-as-new, replaced) runtime state.
    /// New events are in `state.new_events`, not yet committed.
    pub state: RuntimeState,
    /// Activity invocations addressed to this instance's workers.
    pub activity_messages: Vec<TaskMessage>,
    /// Messages addressed to other orchestrations (children, event targets,
    /// the parent on completion).
    pub orchestrator_messages: Vec<TaskMessage>,
    /// Deferred timer messages addressed to this instance.
    pub timer_messages: Vec<TaskMessage>,
    /// Status after the turn, for the store's status row.
    pub updated_status: OrchestrationStatus,
    /// True when the batch ended in continue-as-new; the caller re-runs the
    /// work item against the replaced state instead of committing.
    pub continue_as_new: bool,
}

/// Apply one turn's actions to the runtime state.
///
/// Per action: append the induced history event and collect the outbound
/// message the action implies. A continue-as-new completion replaces the
/// state wholesale and ignores the rest of the batch. Otherwise an
/// `OrchestratorCompleted` marker is appended after the batch.
pub fn apply_actions(
    now: DateTime<Utc>,
    mut state: RuntimeState,
    actions: &[OrchestratorAction],
    custom_status: Option<String>,
) -> Result<ApplyOutcome, ApplyError> {
    if state.instance.instance_id.is_empty() {
        return Err(ApplyError::MissingInstance);
    }

    let mut activity_messages = Vec::new();
    let mut orchestrator_messages = Vec::new();
    let mut timer_messages = Vec::new();

    for action in actions {
        match &action.kind {
            ActionKind::ScheduleTask { name, input } => {
                if name.is_empty() {
                    return Err(ApplyError::EmptyTaskName(action.id));
                }
                let event = HistoryEvent::new(
                    action.id,
                    now,
                    EventKind::TaskScheduled { name: name.clone(), input: input.clone() },
                );
                activity_messages.push(TaskMessage::new(state.instance.clone(), event.clone()));
                state.add_event(event);
            }

            ActionKind::CreateTimer { fire_at } => {
                state.add_event(HistoryEvent::new(
                    action.id,
                    now,
                    EventKind::TimerCreated { fire_at: *fire_at },
                ));
                timer_messages.push(TaskMessage::new(
                    state.instance.clone(),
                    HistoryEvent::system(
                        now,
                        EventKind::TimerFired { scheduled_id: action.id, fire_at: *fire_at },
                    ),
                ));
            }

            ActionKind::CreateSubOrchestration { name, instance_id, input, tags } => {
                if name.is_empty() {
                    return Err(ApplyError::EmptyTaskName(action.id));
                }
                if instance_id.is_empty() {
                    return Err(ApplyError::EmptyTarget(action.id));
                }
                state.add_event(HistoryEvent::new(
                    action.id,
                    now,
                    EventKind::SubOrchestrationCreated {
                        name: name.clone(),
                        instance_id: instance_id.clone(),
                        input: input.clone(),
                    },
                ));
                let child = OrchestrationInstance::new(instance_id.clone());
                orchestrator_messages.push(TaskMessage::new(
                    child,
                    HistoryEvent::system(
                        now,
                        EventKind::ExecutionStarted {
                            name: name.clone(),
                            input: input.clone(),
                            parent: Some(ParentInfo {
                                instance: state.instance.clone(),
                                name: state.name.clone(),
                                scheduled_id: action.id,
                            }),
                            tags: tags.clone(),
                            scheduled_start_time: None,
                        },
                    ),
                ));
            }

            ActionKind::SendEvent { target_instance_id, name, input } => {
                if target_instance_id.is_empty() {
                    return Err(ApplyError::EmptyTarget(action.id));
                }
                state.add_event(HistoryEvent::new(
                    action.id,
                    now,
                    EventKind::EventSent {
                        target_instance_id: target_instance_id.clone(),
                        name: name.clone(),
                        input: input.clone(),
                    },
                ));
                // Empty execution id: addressed to whatever generation is
                // current when the message arrives.
                orchestrator_messages.push(TaskMessage::new(
                    OrchestrationInstance::with_execution(target_instance_id.clone(), ""),
                    HistoryEvent::system(
                        now,
                        EventKind::EventRaised { name: name.clone(), input: input.clone() },
                    ),
                ));
            }

            ActionKind::CompleteOrchestration { outcome } if outcome.is_continue_as_new() => {
                let mut next = RuntimeState::new(state.instance.next_generation());
                next.add_event(HistoryEvent::system(now, EventKind::OrchestratorStarted));
                let mut name = state.name.clone();
                if let Some(version) = &outcome.new_version {
                    name.version = version.clone();
                }
                next.add_event(HistoryEvent::system(
                    now,
                    EventKind::ExecutionStarted {
                        name,
                        input: outcome.result.clone(),
                        parent: state.parent.clone(),
                        tags: state.tags.clone(),
                        scheduled_start_time: None,
                    },
                ));
                for carried in &outcome.carryover {
                    next.add_event(carried.clone());
                }
                let updated_status = next.runtime_status;
                // Remaining actions in the batch are ignored.
                return Ok(ApplyOutcome {
                    state: next,
                    activity_messages: Vec::new(),
                    orchestrator_messages: Vec::new(),
                    timer_messages: Vec::new(),
                    updated_status,
                    continue_as_new: true,
                });
            }

            ActionKind::CompleteOrchestration { outcome } => {
                // Failure details go to the status row and the parent
                // notification, never into history.
                state.add_event(HistoryEvent::new(
                    action.id,
                    now,
                    EventKind::ExecutionCompleted {
                        status: outcome.status,
                        result: outcome.result.clone(),
                        failure: None,
                    },
                ));
                state.failure = outcome.failure.clone();
                if let Some(parent) = state.parent.clone() {
                    orchestrator_messages.push(parent_notification(&parent, now, outcome));
                }
            }
        }
    }

    state.add_event(HistoryEvent::system(now, EventKind::OrchestratorCompleted));
    if custom_status.is_some() {
        state.custom_status = custom_status;
    }
    state.last_updated = Some(now);
    let updated_status = state.runtime_status;

    Ok(ApplyOutcome {
        state,
        activity_messages,
        orchestrator_messages,
        timer_messages,
        updated_status,
        continue_as_new: false,
    })
}

/// Completion message for the parent of a finished sub-orchestration.
fn parent_notification(
    parent: &ParentInfo,
    now: DateTime<Utc>,
    outcome: &crate::action::CompletionOutcome,
) -> TaskMessage {
    let kind = match outcome.status {
        OrchestrationStatus::Completed => EventKind::SubOrchestrationCompleted {
            scheduled_id: parent.scheduled_id,
            result: outcome.result.clone(),
        },
        // Failed and Terminated both surface to the parent as a failed
        // sub-orchestration.
        _ => EventKind::SubOrchestrationFailed {
            scheduled_id: parent.scheduled_id,
            failure: outcome.failure.clone().unwrap_or_else(|| {
                TaskFailureDetails::non_retriable(
                    "OrchestrationTerminated",
                    outcome
                        .result
                        .as_ref()
                        .and_then(|v| v.as_str())
                        .unwrap_or("orchestration terminated"),
                )
            }),
        },
    };
    TaskMessage::new(parent.instance.clone(), HistoryEvent::system(now, kind))
}

#[cfg(test)]
#[path = "apply_tests.rs"]
mod tests;
