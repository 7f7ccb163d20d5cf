// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fibonacci spec: recursion through sub-orchestrations.

use crate::prelude::*;
use dt_worker::OrchestrationContext;
use serde_json::Value;

async fn fib(ctx: OrchestrationContext) -> Result<Value, dt_worker::OrchestrationError> {
    let n: i64 = ctx.input_as()?;
    if n < 2 {
        let base = ctx.call_activity("Base", json!(n)).await?;
        return Ok(base);
    }
    let a = ctx.call_sub_orchestrator("Fib", None, json!(n - 1)).await?;
    let b = ctx.call_sub_orchestrator("Fib", None, json!(n - 2)).await?;
    let sum = a.as_i64().unwrap_or(0) + b.as_i64().unwrap_or(0);
    Ok(json!(sum))
}

fn registry() -> Registry {
    Registry::new().orchestrator("Fib", fib).activity("Base", |ctx| async move {
        let n: i64 = ctx.input_as()?;
        Ok(json!(n))
    })
}

#[tokio::test]
async fn fib_five_is_five() {
    let harness = Harness::start(registry());
    harness
        .client
        .schedule("Fib", ScheduleOptions::new().instance_id("fib-root").input(json!(5)))
        .await
        .unwrap();

    let info = harness.client.wait_for_completion("fib-root", Duration::from_secs(30)).await.unwrap();
    assert_eq!(info.status, WireStatus::Completed);
    assert_eq!(info.output, Some(json!(5)));

    // Every non-terminal node spawns two children: 2·F(6)−1 = 15 instances.
    let (instances, _) = harness.client.query(QueryFilter::default()).await.unwrap();
    assert_eq!(instances.len(), 15);
    assert!(instances.iter().all(|i| i.status == WireStatus::Completed));
    harness.shutdown().await;
}
