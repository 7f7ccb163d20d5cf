// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestration identity types.

use serde::{Deserialize, Serialize};

/// Identity of one orchestration: a stable `instance_id` plus the
/// `execution_id` of its current generation. A fresh execution id is
/// minted on every continue-as-new; the instance id never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationInstance {
    pub instance_id: String,
    pub execution_id: String,
}

impl OrchestrationInstance {
    /// Create an instance with a freshly minted execution id.
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self { instance_id: instance_id.into(), execution_id: nanoid::nanoid!(19) }
    }

    /// Create an instance with both ids given (wire decode, replay).
    pub fn with_execution(
        instance_id: impl Into<String>,
        execution_id: impl Into<String>,
    ) -> Self {
        Self { instance_id: instance_id.into(), execution_id: execution_id.into() }
    }

    /// Create an instance with a generated instance id.
    pub fn random() -> Self {
        Self::new(format!("dt-{}", nanoid::nanoid!(19)))
    }

    /// Same instance, next generation: keeps the instance id and mints a
    /// fresh execution id.
    pub fn next_generation(&self) -> Self {
        Self::new(self.instance_id.clone())
    }
}

impl std::fmt::Display for OrchestrationInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.instance_id, self.execution_id)
    }
}

/// Name + version pair addressing a registered orchestrator or activity.
/// An empty version means "unversioned".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskName {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

impl TaskName {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), version: String::new() }
    }

    pub fn versioned(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { name: name.into(), version: version.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

impl From<&str> for TaskName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TaskName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.version.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}@{}", self.name, self.version)
        }
    }
}

/// Link from a child orchestration back to its parent: the parent's
/// identity plus the `SubOrchestrationCreated` event id that scheduled the
/// child. Parent and child reference each other only through these ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentInfo {
    pub instance: OrchestrationInstance,
    pub name: TaskName,
    pub scheduled_id: i32,
}

/// Routing key for a dispatched activity: `instance_id "." task_id`.
pub fn activity_dispatch_id(instance_id: &str, task_id: i32) -> String {
    format!("{}.{}", instance_id, task_id)
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
