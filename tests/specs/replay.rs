// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replay determinism spec across a worker restart.

use crate::prelude::*;
use dt_core::EventKind;
use dt_worker::OrchestrationContext;
use serde_json::Value;

/// One activity, then an external event; the result pairs both with a
/// replay-stable GUID.
async fn two_phase(ctx: OrchestrationContext) -> Result<Value, dt_worker::OrchestrationError> {
    let marker = ctx.new_guid().to_string();
    let first = ctx.call_activity("Inc", json!(0)).await?;
    let second = ctx.wait_for_external_event("go").await?;
    Ok(json!({ "marker": marker, "first": first, "second": second }))
}

fn registry() -> Registry {
    Registry::new().orchestrator("TwoPhase", two_phase).activity("Inc", |ctx| async move {
        let n: i64 = ctx.input_as()?;
        Ok(json!(n + 1))
    })
}

#[tokio::test]
async fn restart_between_turns_replays_the_same_prefix() {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());

    // Phase 1: run until the activity completed and the orchestrator is
    // parked on the event.
    let first_deployment = Harness::start_with_store(Arc::clone(&store), registry());
    first_deployment
        .client
        .schedule("TwoPhase", ScheduleOptions::new().instance_id("tp-1"))
        .await
        .unwrap();
    wait_until(&first_deployment.client, "tp-1", |info| {
        info.history.as_ref().is_some_and(|h| {
            h.iter().any(|e| matches!(e.kind, EventKind::TaskCompleted { .. }))
        })
    })
    .await;
    first_deployment.shutdown().await;

    // Phase 2: a fresh hub and worker over the same store; history must
    // replay cleanly and the event finishes the run.
    let second_deployment = Harness::start_with_store(Arc::clone(&store), registry());
    second_deployment.client.raise_event("tp-1", "go", json!("done")).await.unwrap();
    let info = second_deployment.client.wait_for_completion("tp-1", SPEC_WAIT).await.unwrap();

    assert_eq!(info.status, WireStatus::Completed);
    let output = info.output.unwrap();
    assert_eq!(output["first"], json!(1));
    assert_eq!(output["second"], json!("done"));
    assert!(!output["marker"].as_str().unwrap_or_default().is_empty());

    // The replayed prefix produced no duplicate events: exactly one
    // scheduled id 0, and every orchestrator-assigned id is unique.
    let history = second_deployment.client.get("tp-1", true).await.unwrap().history.unwrap();
    let scheduled: Vec<i32> = history
        .iter()
        .filter(|e| matches!(e.kind, EventKind::TaskScheduled { .. }))
        .map(|e| e.event_id)
        .collect();
    assert_eq!(scheduled, vec![0]);
    let mut assigned: Vec<i32> =
        history.iter().map(|e| e.event_id).filter(|id| *id >= 0).collect();
    let before = assigned.len();
    assigned.sort_unstable();
    assigned.dedup();
    assert_eq!(assigned.len(), before, "orchestrator-assigned ids are unique");
    second_deployment.shutdown().await;
}

/// Poll the client until the predicate holds, returning the last snapshot.
async fn wait_until(
    client: &TaskHubClient,
    instance_id: &str,
    predicate: impl Fn(&dt_wire::OrchestrationInfo) -> bool,
) -> dt_wire::OrchestrationInfo {
    let deadline = tokio::time::Instant::now() + SPEC_WAIT;
    loop {
        if let Ok(info) = client.get(instance_id, true).await {
            if predicate(&info) {
                return info;
            }
        }
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {}", instance_id);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
