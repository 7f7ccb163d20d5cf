// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire spec: the same chain, but over a Unix socket hub.

use crate::prelude::*;
use dt_client::RemoteClient;
use dt_hub::HubListener;
use dt_wire::ClientRequest;
use dt_worker::RemoteWorker;
use serde_json::Value;
use tokio::net::UnixListener;

fn registry() -> Registry {
    Registry::new()
        .orchestrator("Chain", |ctx| async move {
            let n: i64 = ctx.input_as()?;
            let mut count = json!(0);
            for _ in 0..n {
                count = ctx.call_activity("Inc", count).await?;
            }
            Ok(count)
        })
        .activity("Inc", |ctx| async move {
            let n: i64 = ctx.input_as()?;
            Ok(json!(n + 1))
        })
}

#[tokio::test]
async fn chain_over_a_unix_socket() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hub.sock");

    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let hub = HubDispatcher::new(Arc::clone(&store), HubOptions::default());
    let ct = CancellationToken::new();
    hub.start(&ct);
    tokio::spawn(HubListener::new(UnixListener::bind(&path).unwrap(), Arc::clone(&hub)).run());

    // Worker over the socket.
    {
        let path = path.clone();
        let ct = ct.clone();
        tokio::spawn(async move {
            let worker = RemoteWorker::new(registry());
            let _ = worker.run_unix(&path, &ct).await;
        });
    }

    // Client over the socket.
    let client = RemoteClient::connect(&path).await.unwrap();
    let response = client
        .call(ClientRequest::Schedule {
            name: "Chain".into(),
            instance_id: Some("wire-1".into()),
            input: Some(json!(4)),
            tags: indexmap::IndexMap::new(),
            start_at: None,
            dedupe_statuses: vec![WireStatus::Pending, WireStatus::Running],
        })
        .await
        .unwrap();
    assert!(matches!(response, dt_wire::Response::Instance { .. }));

    let done = client
        .call(ClientRequest::WaitForState {
            instance_id: "wire-1".into(),
            states: Vec::new(),
            timeout_ms: 10_000,
        })
        .await
        .unwrap();
    match done {
        dt_wire::Response::Instance { info } => {
            assert_eq!(info.status, WireStatus::Completed);
            assert_eq!(info.output, Some(Value::from(4)));
        }
        other => panic!("unexpected response: {:?}", other),
    }
    ct.cancel();
}
