// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Termination spec: mid-flight terminate and parent notification.

use crate::prelude::*;
use dt_worker::OrchestrationContext;
use serde_json::Value;

async fn slow(ctx: OrchestrationContext) -> Result<Value, dt_worker::OrchestrationError> {
    let v = ctx.call_activity("Sleep", json!(null)).await?;
    Ok(v)
}

async fn parked(ctx: OrchestrationContext) -> Result<Value, dt_worker::OrchestrationError> {
    let v = ctx.wait_for_external_event("never").await?;
    Ok(v)
}

/// Parent that reports how its child ended.
async fn parent(ctx: OrchestrationContext) -> Result<Value, dt_worker::OrchestrationError> {
    match ctx.call_sub_orchestrator("Parked", Some("parked-child".into()), json!(null)).await {
        Ok(_) => Ok(json!("child-completed")),
        Err(failure) => Ok(json!(failure.error_type)),
    }
}

fn registry() -> Registry {
    Registry::new()
        .orchestrator("Slow", slow)
        .orchestrator("Parked", parked)
        .orchestrator("Parent", parent)
        .activity("Sleep", |_ctx| async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(json!("too late"))
        })
}

#[tokio::test]
async fn terminate_mid_activity_reaches_terminated() {
    let harness = Harness::start(registry());
    harness
        .client
        .schedule("Slow", ScheduleOptions::new().instance_id("slow-1"))
        .await
        .unwrap();

    // Let the first turn schedule the activity, then pull the plug.
    harness
        .client
        .wait_for_state("slow-1", vec![WireStatus::Running], SPEC_WAIT)
        .await
        .unwrap();
    harness.client.terminate("slow-1", Some("stop".to_string())).await.unwrap();

    let info = harness.client.wait_for_completion("slow-1", SPEC_WAIT).await.unwrap();
    assert_eq!(info.status, WireStatus::Terminated);
    assert_eq!(info.output, Some(json!("stop")));
    harness.shutdown().await;
}

#[tokio::test]
async fn terminated_child_fails_its_parent_await() {
    let harness = Harness::start(registry());
    harness
        .client
        .schedule("Parent", ScheduleOptions::new().instance_id("parent-1"))
        .await
        .unwrap();

    // Wait for the child instance to exist, then terminate it.
    harness
        .client
        .wait_for_state("parked-child", vec![WireStatus::Running], SPEC_WAIT)
        .await
        .unwrap();
    harness.client.terminate("parked-child", Some("stop".to_string())).await.unwrap();

    let info = harness.client.wait_for_completion("parent-1", SPEC_WAIT).await.unwrap();
    assert_eq!(info.status, WireStatus::Completed);
    assert_eq!(info.output, Some(json!("OrchestrationTerminated")));
    harness.shutdown().await;
}
