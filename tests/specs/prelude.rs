// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for the end-to-end specs.

pub use dt_client::{ScheduleOptions, TaskHubClient};
pub use dt_hub::{HubDispatcher, HubOptions};
pub use dt_store::{InMemoryStore, Store};
pub use dt_wire::{QueryFilter, WireStatus};
pub use dt_worker::{Registry, WorkerDispatcher};
pub use serde_json::json;
pub use std::sync::Arc;
pub use std::time::Duration;
pub use tokio_util::sync::CancellationToken;

/// Upper bound for any single spec wait.
pub const SPEC_WAIT: Duration = Duration::from_secs(10);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One in-process deployment: store, hub, worker, client.
pub struct Harness {
    pub store: Arc<dyn Store>,
    pub hub: Arc<HubDispatcher>,
    pub client: TaskHubClient,
    pub ct: CancellationToken,
}

impl Harness {
    /// Fresh store, hub, and worker running the given registry.
    pub fn start(registry: Registry) -> Self {
        Self::start_with_store(Arc::new(InMemoryStore::new()), registry)
    }

    /// Attach a hub and worker to an existing store (restart simulation,
    /// pre-seeded messages).
    pub fn start_with_store(store: Arc<dyn Store>, registry: Registry) -> Self {
        init_tracing();
        let hub = HubDispatcher::new(Arc::clone(&store), HubOptions::default());
        let ct = CancellationToken::new();
        hub.start(&ct);
        WorkerDispatcher::new(Arc::clone(&hub), registry).start(&ct);
        let client = TaskHubClient::new(Arc::clone(&store));
        Self { store, hub, client, ct }
    }

    /// Stop the worker and abandon in-flight work.
    pub async fn shutdown(&self) {
        self.ct.cancel();
        self.hub.dispose().await;
    }
}
