// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External event specs: concurrent waits on one event name.

use crate::prelude::*;
use dt_worker::OrchestrationContext;
use serde_json::Value;

/// Holds two concurrent waits on "tick" and reports the payloads in
/// waiter-registration order.
async fn pair(ctx: OrchestrationContext) -> Result<Value, dt_worker::OrchestrationError> {
    let first_wait = ctx.wait_for_external_event("tick");
    let second_wait = ctx.wait_for_external_event("tick");
    let (first, second) = futures_util::future::join(first_wait, second_wait).await;
    Ok(json!([first?, second?]))
}

/// Parks on "gate" so "tick" events arriving in the meantime buffer;
/// the later waits consume the buffer.
async fn gated(ctx: OrchestrationContext) -> Result<Value, dt_worker::OrchestrationError> {
    ctx.wait_for_external_event("gate").await?;
    let first = ctx.wait_for_external_event("tick").await?;
    let second = ctx.wait_for_external_event("tick").await?;
    Ok(json!([first, second]))
}

fn registry() -> Registry {
    Registry::new().orchestrator("Pair", pair).orchestrator("Gated", gated)
}

#[tokio::test]
async fn concurrent_waits_pair_events_in_order() {
    let harness = Harness::start(registry());
    harness
        .client
        .schedule("Pair", ScheduleOptions::new().instance_id("pair-1"))
        .await
        .unwrap();
    harness.client.wait_for_state("pair-1", vec![WireStatus::Running], SPEC_WAIT).await.unwrap();

    harness.client.raise_event("pair-1", "tick", json!("first")).await.unwrap();
    harness.client.raise_event("pair-1", "tick", json!("second")).await.unwrap();

    // First-registered waiter gets the first event, second the second,
    // regardless of whether the events share a turn.
    let info = harness.client.wait_for_completion("pair-1", SPEC_WAIT).await.unwrap();
    assert_eq!(info.status, WireStatus::Completed);
    assert_eq!(info.output, Some(json!(["first", "second"])));
    harness.shutdown().await;
}

#[tokio::test]
async fn events_buffered_while_parked_keep_arrival_order() {
    // Both ticks land while the orchestrator is parked on "gate", so
    // neither has a waiter yet: they buffer, and the waits consume the
    // buffer in arrival order once the gate opens.
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let client = TaskHubClient::new(Arc::clone(&store));
    client
        .schedule("Gated", ScheduleOptions::new().instance_id("gated-1"))
        .await
        .unwrap();
    client.raise_event("gated-1", "tick", json!(1)).await.unwrap();
    client.raise_event("gated-1", "tick", json!(2)).await.unwrap();

    let harness = Harness::start_with_store(store, registry());
    harness
        .client
        .wait_for_state("gated-1", vec![WireStatus::Running], SPEC_WAIT)
        .await
        .unwrap();
    harness.client.raise_event("gated-1", "gate", json!(null)).await.unwrap();

    let info = harness.client.wait_for_completion("gated-1", SPEC_WAIT).await.unwrap();
    assert_eq!(info.output, Some(json!([1, 2])));
    harness.shutdown().await;
}
