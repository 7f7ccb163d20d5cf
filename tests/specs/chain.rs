// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Linear chain spec: n sequential activity calls.

use crate::prelude::*;
use dt_core::EventKind;
use dt_worker::OrchestrationContext;
use serde_json::Value;

async fn chain(ctx: OrchestrationContext) -> Result<Value, dt_worker::OrchestrationError> {
    let n: i64 = ctx.input_as()?;
    let mut count = json!(0);
    for _ in 0..n {
        count = ctx.call_activity("Inc", count).await?;
    }
    Ok(count)
}

fn registry() -> Registry {
    Registry::new().orchestrator("Chain", chain).activity("Inc", |ctx| async move {
        let n: i64 = ctx.input_as()?;
        Ok(json!(n + 1))
    })
}

#[tokio::test]
async fn chain_of_five_counts_to_five() {
    let harness = Harness::start(registry());
    harness
        .client
        .schedule("Chain", ScheduleOptions::new().instance_id("chain-1").input(json!(5)))
        .await
        .unwrap();

    let info = harness.client.wait_for_completion("chain-1", SPEC_WAIT).await.unwrap();
    assert_eq!(info.status, WireStatus::Completed);
    assert_eq!(info.output, Some(json!(5)));
    harness.shutdown().await;
}

#[tokio::test]
async fn chain_history_records_every_step() {
    let harness = Harness::start(registry());
    harness
        .client
        .schedule("Chain", ScheduleOptions::new().instance_id("chain-1").input(json!(5)))
        .await
        .unwrap();
    harness.client.wait_for_completion("chain-1", SPEC_WAIT).await.unwrap();

    let info = harness.client.get("chain-1", true).await.unwrap();
    let history = info.history.unwrap();
    let count = |pred: fn(&EventKind) -> bool| history.iter().filter(|e| pred(&e.kind)).count();

    assert_eq!(count(|k| matches!(k, EventKind::TaskScheduled { .. })), 5);
    assert_eq!(count(|k| matches!(k, EventKind::TaskCompleted { .. })), 5);
    assert_eq!(count(|k| matches!(k, EventKind::ExecutionCompleted { .. })), 1);

    // Scheduled ids are contiguous from zero, in emission order.
    let scheduled: Vec<i32> = history
        .iter()
        .filter(|e| matches!(e.kind, EventKind::TaskScheduled { .. }))
        .map(|e| e.event_id)
        .collect();
    assert_eq!(scheduled, vec![0, 1, 2, 3, 4]);
    harness.shutdown().await;
}

#[tokio::test]
async fn repeated_runs_yield_the_same_output() {
    for run in 0..2 {
        let harness = Harness::start(registry());
        let id = format!("chain-{run}");
        harness
            .client
            .schedule("Chain", ScheduleOptions::new().instance_id(id.clone()).input(json!(3)))
            .await
            .unwrap();
        let info = harness.client.wait_for_completion(&id, SPEC_WAIT).await.unwrap();
        assert_eq!(info.output, Some(json!(3)));
        harness.shutdown().await;
    }
}
