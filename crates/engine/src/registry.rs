// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named registries for user orchestrators and activities.

use crate::context::OrchestrationContext;
use crate::error::OrchestrationError;
use dt_core::{TaskFailureDetails, TaskName};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Everything an activity invocation sees.
#[derive(Debug, Clone)]
pub struct ActivityContext {
    pub instance_id: String,
    pub task_id: i32,
    pub input: Option<Value>,
}

impl ActivityContext {
    /// Deserialize the input into a concrete type.
    pub fn input_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, TaskFailureDetails> {
        serde_json::from_value(self.input.clone().unwrap_or(Value::Null)).map_err(|e| {
            TaskFailureDetails::non_retriable("InputDeserialization", e.to_string())
        })
    }
}

/// Activity bodies run on the worker's task pool and must be `Send`.
type ActivityFn = dyn Fn(ActivityContext) -> Pin<Box<dyn Future<Output = Result<Value, TaskFailureDetails>> + Send>>
    + Send
    + Sync;

/// Orchestrator bodies are driven on a single thread; their futures need
/// not be `Send`, but the factory is called from worker threads.
type OrchestratorFn = dyn Fn(OrchestrationContext) -> Pin<Box<dyn Future<Output = Result<Value, OrchestrationError>>>>
    + Send
    + Sync;

/// Name → implementation maps for one worker.
///
/// Lookup ignores the version component: versioning is carried on the
/// wire for the host to route on, not used to pick an implementation
/// here.
#[derive(Default)]
pub struct Registry {
    orchestrators: HashMap<String, Arc<OrchestratorFn>>,
    activities: HashMap<String, Arc<ActivityFn>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an orchestrator under a name.
    pub fn orchestrator<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(OrchestrationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, OrchestrationError>> + 'static,
    {
        self.orchestrators.insert(name.into(), Arc::new(move |ctx| Box::pin(f(ctx))));
        self
    }

    /// Register an activity under a name.
    pub fn activity<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(ActivityContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, TaskFailureDetails>> + Send + 'static,
    {
        self.activities.insert(name.into(), Arc::new(move |ctx| Box::pin(f(ctx))));
        self
    }

    pub(crate) fn find_orchestrator(&self, name: &TaskName) -> Option<Arc<OrchestratorFn>> {
        self.orchestrators.get(&name.name).cloned()
    }

    pub(crate) fn find_activity(&self, name: &TaskName) -> Option<Arc<ActivityFn>> {
        self.activities.get(&name.name).cloned()
    }

    pub fn has_orchestrator(&self, name: &str) -> bool {
        self.orchestrators.contains_key(name)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
