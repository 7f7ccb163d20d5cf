// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured failure payload carried on failed tasks and orchestrations.

use serde::{Deserialize, Serialize};

/// Failure details for a failed activity, sub-orchestration, or
/// orchestration. Mirrors the wire `TaskError` shape: an error type tag, a
/// message, an optional stack trace, an optional inner failure, and a
/// retriability hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailureDetails {
    pub error_type: String,
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner: Option<Box<TaskFailureDetails>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_non_retriable: bool,
}

impl TaskFailureDetails {
    pub fn new(error_type: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            error_message: error_message.into(),
            stack_trace: None,
            inner: None,
            is_non_retriable: false,
        }
    }

    pub fn non_retriable(error_type: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self { is_non_retriable: true, ..Self::new(error_type, error_message) }
    }

    /// Capture an error and its source chain as nested failure details.
    ///
    /// Rust has no runtime type names for `dyn Error` sources, so the caller
    /// supplies the type tag for the outermost error; chained sources are
    /// tagged `"Error"`.
    pub fn from_error(
        error_type: impl Into<String>,
        err: &(dyn std::error::Error + 'static),
    ) -> Self {
        let mut details = Self::new(error_type, err.to_string());
        if let Some(source) = err.source() {
            details.inner = Some(Box::new(Self::from_error("Error", source)));
        }
        details
    }

    crate::setters! {
        option {
            stack_trace: String,
        }
    }

    /// True when this failure or any inner failure carries the given type tag.
    pub fn is_caused_by(&self, error_type: &str) -> bool {
        if self.error_type == error_type {
            return true;
        }
        self.inner.as_ref().is_some_and(|inner| inner.is_caused_by(error_type))
    }
}

impl std::fmt::Display for TaskFailureDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_type, self.error_message)
    }
}

#[cfg(test)]
#[path = "failure_tests.rs"]
mod tests;
