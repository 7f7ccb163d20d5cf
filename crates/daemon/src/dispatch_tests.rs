// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatcher tests: a hand-driven worker against the in-memory store.

use super::*;
use dt_core::test_support::start_message;
use dt_core::{ActionKind, CompletionOutcome, OrchestrationStatus, OrchestratorAction, TaskName};
use dt_store::InMemoryStore;
use dt_wire::TaskError;
use serde_json::json;
use std::time::Duration;

fn setup() -> (Arc<dyn Store>, Arc<HubDispatcher>) {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let hub = HubDispatcher::new(Arc::clone(&store), HubOptions::default());
    hub.start(&CancellationToken::new());
    (store, hub)
}

async fn schedule(store: &Arc<dyn Store>, id: &str) {
    store
        .create_instance(
            start_message(id, "Chain", Some(json!(2))),
            &OrchestrationStatus::dedupe_default(),
        )
        .await
        .unwrap();
}

async fn next_orchestrator_turn(stream: &mut WorkItemStream) -> OrchestratorTurn {
    match tokio::time::timeout(Duration::from_secs(5), stream.next()).await {
        Ok(Some(DispatchedWorkItem::Orchestrator(turn))) => turn,
        other => panic!("expected orchestrator turn, got {:?}", kind_of(other)),
    }
}

async fn next_activity(stream: &mut WorkItemStream) -> ActivityWorkItem {
    match tokio::time::timeout(Duration::from_secs(5), stream.next()).await {
        Ok(Some(DispatchedWorkItem::Activity(wi))) => wi,
        other => panic!("expected activity, got {:?}", kind_of(other)),
    }
}

fn kind_of(
    item: Result<Option<DispatchedWorkItem>, tokio::time::error::Elapsed>,
) -> &'static str {
    match item {
        Ok(Some(DispatchedWorkItem::Activity(_))) => "activity",
        Ok(Some(DispatchedWorkItem::Orchestrator(_))) => "orchestrator",
        Ok(None) => "stream end",
        Err(_) => "timeout",
    }
}

fn complete_action(id: i32, result: serde_json::Value) -> OrchestratorAction {
    OrchestratorAction {
        id,
        kind: ActionKind::CompleteOrchestration {
            outcome: CompletionOutcome::completed(Some(result)),
        },
    }
}

// =============================================================================
// Reader latch
// =============================================================================

#[tokio::test]
async fn streams_gate_the_readers_latch() {
    let (_store, hub) = setup();
    assert!(!hub.readers_available.is_set());

    let stream1 = hub.work_item_stream();
    let stream2 = hub.work_item_stream();
    assert!(hub.readers_available.is_set());

    drop(stream1);
    assert!(hub.readers_available.is_set(), "one reader still connected");
    drop(stream2);
    assert!(!hub.readers_available.is_set(), "last disconnect parks the loops");
}

// =============================================================================
// Turn lifecycle
// =============================================================================

#[tokio::test]
async fn full_activity_round_trip() {
    let (store, hub) = setup();
    schedule(&store, "inst-1").await;
    let mut stream = hub.work_item_stream();

    // Turn 1: the start message; worker schedules one activity.
    let mut turn = next_orchestrator_turn(&mut stream).await;
    assert_eq!(turn.item.instance_id(), "inst-1");
    let seeded = turn.messages.try_recv().unwrap();
    assert!(seeded.message.is_start());

    hub.complete_orchestrator_task(OrchestratorResult {
        instance_id: "inst-1".into(),
        actions: vec![OrchestratorAction {
            id: 0,
            kind: ActionKind::ScheduleTask { name: TaskName::new("Inc"), input: Some(json!(2)) },
        }],
        custom_status: None,
    })
    .await
    .unwrap();

    // The activity comes down the same stream.
    let activity = next_activity(&mut stream).await;
    assert_eq!(activity.name.name, "Inc");
    hub.complete_activity_task(ActivityResult {
        instance_id: "inst-1".into(),
        task_id: activity.task_id,
        result: Some(json!(3)),
        failure: None,
    })
    .await
    .unwrap();

    // Turn 2: the completion; worker finishes.
    let turn2 = next_orchestrator_turn(&mut stream).await;
    assert!(turn2
        .item
        .replay_history
        .iter()
        .any(|e| matches!(e.kind, EventKind::TaskScheduled { .. })));
    hub.complete_orchestrator_task(OrchestratorResult {
        instance_id: "inst-1".into(),
        actions: vec![complete_action(1, json!(3))],
        custom_status: None,
    })
    .await
    .unwrap();

    let state = store.get_state("inst-1", None).await.unwrap().unwrap();
    assert_eq!(state.runtime_status, OrchestrationStatus::Completed);
    assert_eq!(state.output, Some(json!(3)));
}

#[tokio::test]
async fn failed_activity_produces_task_failed_event() {
    let (store, hub) = setup();
    schedule(&store, "inst-1").await;
    let mut stream = hub.work_item_stream();

    let _turn = next_orchestrator_turn(&mut stream).await;
    hub.complete_orchestrator_task(OrchestratorResult {
        instance_id: "inst-1".into(),
        actions: vec![OrchestratorAction {
            id: 0,
            kind: ActionKind::ScheduleTask { name: TaskName::new("Boom"), input: None },
        }],
        custom_status: None,
    })
    .await
    .unwrap();

    let activity = next_activity(&mut stream).await;
    hub.complete_activity_task(ActivityResult {
        instance_id: "inst-1".into(),
        task_id: activity.task_id,
        result: None,
        failure: Some(TaskError {
            error_type: "Boom".into(),
            error_message: "it broke".into(),
            stack_trace: None,
            inner_error: None,
            is_non_retriable: true,
        }),
    })
    .await
    .unwrap();

    let turn2 = next_orchestrator_turn(&mut stream).await;
    let mut messages = Vec::new();
    let mut rx = turn2.messages;
    while let Ok(m) = rx.try_recv() {
        messages.push(m);
    }
    assert!(messages
        .iter()
        .any(|m| matches!(m.message.event.kind, EventKind::TaskFailed { scheduled_id: 0, .. })));
}

// =============================================================================
// Unknown completions
// =============================================================================

#[tokio::test]
async fn unknown_activity_completion_is_not_found() {
    let (_store, hub) = setup();
    let err = hub
        .complete_activity_task(ActivityResult {
            instance_id: "ghost".into(),
            task_id: 7,
            result: None,
            failure: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::NotFound(_)));
}

#[tokio::test]
async fn unknown_orchestrator_completion_is_not_found() {
    let (_store, hub) = setup();
    let err = hub
        .complete_orchestrator_task(OrchestratorResult {
            instance_id: "ghost".into(),
            actions: vec![],
            custom_status: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::NotFound(_)));
}

// =============================================================================
// Invalid action batches
// =============================================================================

#[tokio::test]
async fn rejected_batch_abandons_and_retries_the_turn() {
    let (store, hub) = setup();
    schedule(&store, "inst-1").await;
    let mut stream = hub.work_item_stream();

    let _turn = next_orchestrator_turn(&mut stream).await;
    let err = hub
        .complete_orchestrator_task(OrchestratorResult {
            instance_id: "inst-1".into(),
            actions: vec![OrchestratorAction {
                id: 0,
                kind: ActionKind::ScheduleTask { name: TaskName::new(""), input: None },
            }],
            custom_status: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::Apply(_)));

    // The turn went back to the store and is re-dispatched.
    let retry = next_orchestrator_turn(&mut stream).await;
    assert_eq!(retry.item.instance_id(), "inst-1");
}

// =============================================================================
// Continue-as-new
// =============================================================================

#[tokio::test]
async fn continue_as_new_redispatches_without_commit() {
    let (store, hub) = setup();
    schedule(&store, "inst-1").await;
    let mut stream = hub.work_item_stream();
    let first_execution = store
        .get_state("inst-1", None)
        .await
        .unwrap()
        .unwrap()
        .instance
        .execution_id;

    let _turn = next_orchestrator_turn(&mut stream).await;
    hub.complete_orchestrator_task(OrchestratorResult {
        instance_id: "inst-1".into(),
        actions: vec![OrchestratorAction {
            id: 0,
            kind: ActionKind::CompleteOrchestration {
                outcome: CompletionOutcome::continued_as_new(Some(json!(1)), Vec::new()),
            },
        }],
        custom_status: None,
    })
    .await
    .unwrap();

    // Nothing committed yet: the store still sees the first generation.
    let state = store.get_state("inst-1", None).await.unwrap().unwrap();
    assert_eq!(state.instance.execution_id, first_execution);

    // The chained turn arrives with a fresh start and empty history.
    let mut turn2 = next_orchestrator_turn(&mut stream).await;
    assert!(turn2.item.replay_history.is_empty());
    assert_ne!(turn2.item.instance.execution_id, first_execution);
    let seeded = turn2.messages.try_recv().unwrap();
    assert!(seeded.message.is_start());

    // Finishing the chain commits the new generation.
    hub.complete_orchestrator_task(OrchestratorResult {
        instance_id: "inst-1".into(),
        actions: vec![complete_action(1, json!("done"))],
        custom_status: None,
    })
    .await
    .unwrap();
    let state = store.get_state("inst-1", None).await.unwrap().unwrap();
    assert_eq!(state.runtime_status, OrchestrationStatus::Completed);
    assert_ne!(state.instance.execution_id, first_execution);
}

// =============================================================================
// Disposal
// =============================================================================

#[tokio::test]
async fn dispose_abandons_outstanding_work() {
    let (store, hub) = setup();
    schedule(&store, "inst-1").await;
    let mut stream = hub.work_item_stream();
    let _turn = next_orchestrator_turn(&mut stream).await;

    hub.dispose().await;
    hub.dispose().await; // idempotent

    assert!(hub.pending_orchestrations.lock().is_empty());
    // The abandoned instance is re-lockable straight from the store.
    let ct = CancellationToken::new();
    let wi = store.lock_next_orchestration(&ct).await.unwrap();
    assert_eq!(wi.instance_id(), "inst-1");
}

#[tokio::test]
async fn custom_status_is_persisted_on_commit() {
    let (store, hub) = setup();
    schedule(&store, "inst-1").await;
    let mut stream = hub.work_item_stream();

    let _turn = next_orchestrator_turn(&mut stream).await;
    hub.complete_orchestrator_task(OrchestratorResult {
        instance_id: "inst-1".into(),
        actions: vec![],
        custom_status: Some("warming up".into()),
    })
    .await
    .unwrap();

    let state = store.get_state("inst-1", None).await.unwrap().unwrap();
    assert_eq!(state.custom_status.as_deref(), Some("warming up"));
}
