// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process management client over a store.

use crate::error::ClientError;
use chrono::{DateTime, Utc};
use dt_core::{Clock, SystemClock, TaskName};
use dt_hub::handle_client_request;
use dt_store::Store;
use dt_wire::{
    ClientRequest, OrchestrationInfo, QueryFilter, Response, WireStatus,
};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

/// Options for scheduling a new orchestration.
#[derive(Debug, Clone)]
pub struct ScheduleOptions {
    pub instance_id: Option<String>,
    pub input: Option<Value>,
    pub tags: IndexMap<String, String>,
    pub start_at: Option<DateTime<Utc>>,
    /// Existing records in these statuses make the schedule fail with
    /// AlreadyExists. Defaults to {Pending, Running}.
    pub dedupe_statuses: Vec<WireStatus>,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self {
            instance_id: None,
            input: None,
            tags: IndexMap::new(),
            start_at: None,
            dedupe_statuses: vec![WireStatus::Pending, WireStatus::Running],
        }
    }
}

impl ScheduleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    dt_core::setters! {
        set {
            tags: IndexMap<String, String>,
            dedupe_statuses: Vec<WireStatus>,
        }
        option {
            instance_id: String,
            input: Value,
            start_at: DateTime<Utc>,
        }
    }
}

/// Management client bound to an in-process store.
pub struct TaskHubClient<C: Clock = SystemClock> {
    store: Arc<dyn Store>,
    clock: C,
}

impl TaskHubClient<SystemClock> {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store, clock: SystemClock }
    }
}

impl<C: Clock> TaskHubClient<C> {
    pub fn with_clock(store: Arc<dyn Store>, clock: C) -> Self {
        Self { store, clock }
    }

    /// Create and start an orchestration; returns its initial snapshot.
    pub async fn schedule(
        &self,
        name: impl Into<TaskName>,
        options: ScheduleOptions,
    ) -> Result<OrchestrationInfo, ClientError> {
        let request = ClientRequest::Schedule {
            name: name.into(),
            instance_id: options.instance_id,
            input: options.input,
            tags: options.tags,
            start_at: options.start_at,
            dedupe_statuses: options.dedupe_statuses,
        };
        expect_instance(self.call(request).await, "schedule")
    }

    /// Current snapshot; `expand_history` includes the committed events.
    pub async fn get(
        &self,
        instance_id: &str,
        expand_history: bool,
    ) -> Result<OrchestrationInfo, ClientError> {
        let request =
            ClientRequest::Get { instance_id: instance_id.to_string(), expand_history };
        expect_instance(self.call(request).await, "get")
    }

    /// Block until the orchestration reaches a terminal status.
    pub async fn wait_for_completion(
        &self,
        instance_id: &str,
        timeout: std::time::Duration,
    ) -> Result<OrchestrationInfo, ClientError> {
        let request = ClientRequest::WaitForState {
            instance_id: instance_id.to_string(),
            states: Vec::new(),
            timeout_ms: timeout.as_millis() as u64,
        };
        expect_instance(self.call(request).await, "wait_for_completion")
    }

    /// Block until the orchestration reaches one of `states`.
    pub async fn wait_for_state(
        &self,
        instance_id: &str,
        states: Vec<WireStatus>,
        timeout: std::time::Duration,
    ) -> Result<OrchestrationInfo, ClientError> {
        let request = ClientRequest::WaitForState {
            instance_id: instance_id.to_string(),
            states,
            timeout_ms: timeout.as_millis() as u64,
        };
        expect_instance(self.call(request).await, "wait_for_state")
    }

    pub async fn raise_event(
        &self,
        instance_id: &str,
        name: impl Into<String>,
        input: impl Into<Option<Value>>,
    ) -> Result<(), ClientError> {
        let request = ClientRequest::RaiseEvent {
            instance_id: instance_id.to_string(),
            name: name.into(),
            input: input.into(),
        };
        expect_ok(self.call(request).await, "raise_event")
    }

    pub async fn terminate(
        &self,
        instance_id: &str,
        reason: impl Into<Option<String>>,
    ) -> Result<(), ClientError> {
        let request = ClientRequest::Terminate {
            instance_id: instance_id.to_string(),
            reason: reason.into(),
        };
        expect_ok(self.call(request).await, "terminate")
    }

    pub async fn suspend(
        &self,
        instance_id: &str,
        reason: impl Into<Option<String>>,
    ) -> Result<(), ClientError> {
        let request = ClientRequest::Suspend {
            instance_id: instance_id.to_string(),
            reason: reason.into(),
        };
        expect_ok(self.call(request).await, "suspend")
    }

    pub async fn resume(
        &self,
        instance_id: &str,
        reason: impl Into<Option<String>>,
    ) -> Result<(), ClientError> {
        let request = ClientRequest::Resume {
            instance_id: instance_id.to_string(),
            reason: reason.into(),
        };
        expect_ok(self.call(request).await, "resume")
    }

    pub async fn query(
        &self,
        filter: QueryFilter,
    ) -> Result<(Vec<OrchestrationInfo>, Option<String>), ClientError> {
        match self.call(ClientRequest::Query { filter }).await {
            Response::Page { instances, continuation } => Ok((instances, continuation)),
            Response::Error { code, message } => Err(ClientError::Hub { code, message }),
            _ => Err(ClientError::UnexpectedResponse("query")),
        }
    }

    /// Purge one terminal instance; returns the purged count (0 or 1).
    pub async fn purge(&self, instance_id: &str) -> Result<u64, ClientError> {
        let request =
            ClientRequest::Purge { instance_id: Some(instance_id.to_string()), filter: None };
        expect_purged(self.call(request).await, "purge")
    }

    /// Purge every terminal instance matching the filter.
    pub async fn purge_matching(&self, filter: QueryFilter) -> Result<u64, ClientError> {
        let request = ClientRequest::Purge { instance_id: None, filter: Some(filter) };
        expect_purged(self.call(request).await, "purge_matching")
    }

    async fn call(&self, request: ClientRequest) -> Response {
        handle_client_request(&self.store, request, self.clock.now_utc()).await
    }
}

fn expect_instance(
    response: Response,
    op: &'static str,
) -> Result<OrchestrationInfo, ClientError> {
    match response {
        Response::Instance { info } => Ok(*info),
        Response::Error { code, message } => Err(ClientError::Hub { code, message }),
        _ => Err(ClientError::UnexpectedResponse(op)),
    }
}

fn expect_ok(response: Response, op: &'static str) -> Result<(), ClientError> {
    match response {
        Response::Ok => Ok(()),
        Response::Error { code, message } => Err(ClientError::Hub { code, message }),
        _ => Err(ClientError::UnexpectedResponse(op)),
    }
}

fn expect_purged(response: Response, op: &'static str) -> Result<u64, ClientError> {
    match response {
        Response::Purged { count } => Ok(count),
        Response::Error { code, message } => Err(ClientError::Hub { code, message }),
        _ => Err(ClientError::UnexpectedResponse(op)),
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
