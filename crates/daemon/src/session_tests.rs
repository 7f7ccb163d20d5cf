// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for session construction, filtering, and the turn channel.

use super::*;
use dt_core::test_support::{
    start_event, start_message, task_completed_event, task_scheduled_event, test_time,
};
use dt_core::{OrchestrationInstance, TaskMessage, TaskName};
use indexmap::IndexMap;
use serde_json::json;

fn work_item(
    instance: OrchestrationInstance,
    replay: Vec<HistoryEvent>,
    messages: Vec<WorkMessage>,
) -> OrchestratorWorkItem {
    OrchestratorWorkItem {
        instance,
        name: TaskName::new("Chain"),
        parent: None,
        replay_history: replay,
        new_messages: messages,
        metadata: IndexMap::new(),
        lock_token: "tok".into(),
        lock_expires_at: None,
    }
}

fn fresh_start() -> (OrchestrationInstance, OrchestratorWorkItem) {
    let msg = start_message("inst-1", "Chain", Some(json!(5)));
    let instance = msg.instance.clone();
    let wi = work_item(instance.clone(), vec![], vec![WorkMessage::for_instance(msg)]);
    (instance, wi)
}

#[test]
fn new_session_seeds_channel_with_turn_messages() {
    let router = MessageRouter::new();
    let (_, wi) = fresh_start();
    let mut session = Session::new(wi, &router, test_time()).unwrap().unwrap();

    assert!(router.is_registered("inst-1"));
    let mut rx = session.take_inbound().unwrap();
    let first = rx.try_recv().unwrap();
    assert!(first.message.is_start());
    assert!(rx.try_recv().is_err(), "exactly the accepted messages are seeded");
}

#[test]
fn turn_state_contains_marker_and_messages() {
    let router = MessageRouter::new();
    let (_, wi) = fresh_start();
    let session = Session::new(wi, &router, test_time()).unwrap().unwrap();

    let kinds: Vec<_> =
        session.turn_state().new_events.iter().map(|e| e.kind.label()).collect();
    assert_eq!(kinds, vec!["orchestrator:started", "execution:started"]);
}

#[test]
fn empty_turn_after_filtering_returns_none() {
    let router = MessageRouter::new();
    let instance = OrchestrationInstance::new("inst-1");
    // Started history + a stale-generation message
    let mut stale = TaskMessage::new(instance.clone(), task_completed_event(0, None));
    stale.instance.execution_id = "dead".into();
    let wi = work_item(
        instance,
        vec![start_event("Chain", None), task_scheduled_event(0, "Inc")],
        vec![WorkMessage::for_instance(stale)],
    );

    assert!(Session::new(wi, &router, test_time()).unwrap().is_none());
    assert!(!router.is_registered("inst-1"), "no dispatcher for an empty turn");
}

#[test]
fn duplicate_completion_is_filtered() {
    let router = MessageRouter::new();
    let instance = OrchestrationInstance::new("inst-1");
    let replay = vec![
        start_event("Chain", None),
        task_scheduled_event(0, "Inc"),
        task_completed_event(0, Some(json!(1))),
    ];
    let duplicate =
        TaskMessage::new(OrchestrationInstance::with_execution("inst-1", ""), task_completed_event(0, Some(json!(1))));
    let wi = work_item(instance, replay, vec![WorkMessage::for_instance(duplicate)]);

    assert!(Session::new(wi, &router, test_time()).unwrap().is_none());
}

#[test]
fn second_session_for_same_instance_is_rejected() {
    let router = MessageRouter::new();
    let (_, wi) = fresh_start();
    let _session = Session::new(wi.clone(), &router, test_time()).unwrap().unwrap();

    let err = Session::new(wi, &router, test_time()).unwrap_err();
    assert!(matches!(err, RouterError::AlreadyRegistered(_)));
}

#[test]
fn routed_messages_join_turn_state_once() {
    let router = MessageRouter::new();
    let instance = OrchestrationInstance::new("inst-1");
    let replay = vec![start_event("Chain", None), task_scheduled_event(0, "Inc")];
    let completion = TaskMessage::new(
        OrchestrationInstance::with_execution("inst-1", ""),
        task_completed_event(0, Some(json!(1))),
    );
    let wi = work_item(
        instance.clone(),
        replay,
        vec![WorkMessage::for_instance(completion.clone())],
    );
    let mut session = Session::new(wi, &router, test_time()).unwrap().unwrap();

    // The same completion routed again mid-turn is deduplicated.
    session.record_routed(WorkMessage::for_instance(completion));
    let state = session.turn_state();
    let completions = state
        .new_events
        .iter()
        .filter(|e| e.kind.completion_scheduled_id() == Some(0))
        .count();
    assert_eq!(completions, 1);
}

#[test]
fn completion_latch_resolves_once() {
    let router = MessageRouter::new();
    let (_, wi) = fresh_start();
    let mut session = Session::new(wi, &router, test_time()).unwrap().unwrap();
    let rx = session.take_completion().unwrap();

    session.complete(dt_core::OrchestrationStatus::Completed);
    session.complete(dt_core::OrchestrationStatus::Failed); // no-op

    assert_eq!(rx.blocking_recv().unwrap(), dt_core::OrchestrationStatus::Completed);
}

#[test]
fn release_unregisters_the_dispatcher() {
    let router = MessageRouter::new();
    let (_, wi) = fresh_start();
    let session = Session::new(wi, &router, test_time()).unwrap().unwrap();
    assert!(router.is_registered("inst-1"));

    session.release(&router);
    assert!(!router.is_registered("inst-1"));
    assert!(!router.deliver(
        "inst-1",
        WorkMessage::for_instance(start_message("inst-1", "Chain", None))
    ));
}

#[test]
fn history_yields_committed_events_in_order() {
    let router = MessageRouter::new();
    let instance = OrchestrationInstance::new("inst-1");
    let replay = vec![start_event("Chain", None), task_scheduled_event(0, "Inc")];
    let completion = TaskMessage::new(
        OrchestrationInstance::with_execution("inst-1", ""),
        task_completed_event(0, None),
    );
    let wi = work_item(instance, replay.clone(), vec![WorkMessage::for_instance(completion)]);
    let session = Session::new(wi, &router, test_time()).unwrap().unwrap();

    let yielded: Vec<_> = session.history().cloned().collect();
    assert_eq!(yielded, replay);
}
