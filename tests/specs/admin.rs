// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admin specs: dedupe, purge, suspend/resume.

use crate::prelude::*;
use dt_worker::OrchestrationContext;
use serde_json::Value;

async fn echo_event(ctx: OrchestrationContext) -> Result<Value, dt_worker::OrchestrationError> {
    let v = ctx.wait_for_external_event("go").await?;
    Ok(v)
}

fn registry() -> Registry {
    Registry::new().orchestrator("EchoEvent", echo_event)
}

#[tokio::test]
async fn duplicate_schedule_while_running_is_rejected() {
    let harness = Harness::start(registry());
    harness
        .client
        .schedule("EchoEvent", ScheduleOptions::new().instance_id("A"))
        .await
        .unwrap();
    harness.client.wait_for_state("A", vec![WireStatus::Running], SPEC_WAIT).await.unwrap();

    let err = harness
        .client
        .schedule("X", ScheduleOptions::new().instance_id("A"))
        .await
        .unwrap_err();
    assert!(err.is_already_exists());
    harness.shutdown().await;
}

#[tokio::test]
async fn purge_removes_terminal_instance() {
    let harness = Harness::start(registry());
    harness
        .client
        .schedule("EchoEvent", ScheduleOptions::new().instance_id("p-1"))
        .await
        .unwrap();
    harness.client.raise_event("p-1", "go", json!(1)).await.unwrap();
    harness.client.wait_for_completion("p-1", SPEC_WAIT).await.unwrap();

    assert_eq!(harness.client.purge("p-1").await.unwrap(), 1);
    let err = harness.client.get("p-1", false).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(harness.client.purge("p-1").await.unwrap(), 0, "second purge finds nothing");
    harness.shutdown().await;
}

#[tokio::test]
async fn suspended_instance_defers_events_until_resume() {
    let harness = Harness::start(registry());
    harness
        .client
        .schedule("EchoEvent", ScheduleOptions::new().instance_id("s-1"))
        .await
        .unwrap();
    harness.client.wait_for_state("s-1", vec![WireStatus::Running], SPEC_WAIT).await.unwrap();

    harness.client.suspend("s-1", Some("pause".to_string())).await.unwrap();
    harness
        .client
        .wait_for_state("s-1", vec![WireStatus::Suspended], SPEC_WAIT)
        .await
        .unwrap();

    // The event is buffered while suspended.
    harness.client.raise_event("s-1", "go", json!("late")).await.unwrap();
    let still = harness.client.get("s-1", false).await.unwrap();
    assert_eq!(still.status, WireStatus::Suspended);

    // Resume releases the backlog and the orchestration completes.
    harness.client.resume("s-1", None).await.unwrap();
    let info = harness.client.wait_for_completion("s-1", SPEC_WAIT).await.unwrap();
    assert_eq!(info.output, Some(json!("late")));
    harness.shutdown().await;
}
