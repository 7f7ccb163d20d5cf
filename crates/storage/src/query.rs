// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Query filters and pages for orchestration metadata.

use chrono::{DateTime, Utc};
use dt_core::{OrchestrationStatus, RuntimeState};
use serde::{Deserialize, Serialize};

/// Filter for `Store::query` and `Store::purge_matching`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationQuery {
    /// Match any of these statuses; empty means all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statuses: Vec<OrchestrationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_to: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id_prefix: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation: Option<String>,
}

fn default_page_size() -> usize {
    100
}

impl OrchestrationQuery {
    pub fn new() -> Self {
        Self { page_size: default_page_size(), ..Default::default() }
    }

    dt_core::setters! {
        set {
            statuses: Vec<OrchestrationStatus>,
            page_size: usize,
        }
        option {
            created_from: DateTime<Utc>,
            created_to: DateTime<Utc>,
            instance_id_prefix: String,
            continuation: String,
        }
    }

    /// Does this state match the filter (continuation/paging aside)?
    pub fn matches(&self, state: &RuntimeState) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&state.runtime_status) {
            return false;
        }
        if let Some(prefix) = &self.instance_id_prefix {
            if !state.instance.instance_id.starts_with(prefix.as_str()) {
                return false;
            }
        }
        match (self.created_from, state.created_at) {
            (Some(from), Some(created)) if created < from => return false,
            (Some(_), None) => return false,
            _ => {}
        }
        if let (Some(to), Some(created)) = (self.created_to, state.created_at) {
            if created > to {
                return false;
            }
        }
        true
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPage {
    pub instances: Vec<RuntimeState>,
    /// Opaque token for the next page, absent on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation: Option<String>,
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
