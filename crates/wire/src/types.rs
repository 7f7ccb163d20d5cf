// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire-side mirrors of core types, mapped both ways at the codec boundary.

use dt_core::{OrchestrationStatus, TaskFailureDetails};
use serde::{Deserialize, Serialize};

/// Error payload carried on failed completions and error responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub error_type: String,
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_error: Option<Box<TaskError>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_non_retriable: bool,
}

impl From<&TaskFailureDetails> for TaskError {
    fn from(details: &TaskFailureDetails) -> Self {
        Self {
            error_type: details.error_type.clone(),
            error_message: details.error_message.clone(),
            stack_trace: details.stack_trace.clone(),
            inner_error: details.inner.as_deref().map(|inner| Box::new(TaskError::from(inner))),
            is_non_retriable: details.is_non_retriable,
        }
    }
}

impl From<&TaskError> for TaskFailureDetails {
    fn from(error: &TaskError) -> Self {
        Self {
            error_type: error.error_type.clone(),
            error_message: error.error_message.clone(),
            stack_trace: error.stack_trace.clone(),
            inner: error
                .inner_error
                .as_deref()
                .map(|inner| Box::new(TaskFailureDetails::from(inner))),
            is_non_retriable: error.is_non_retriable,
        }
    }
}

/// Orchestration status as it travels on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireStatus {
    Pending,
    Running,
    Suspended,
    Completed,
    Failed,
    Terminated,
    Canceled,
    ContinuedAsNew,
}

impl WireStatus {
    pub fn is_terminal(&self) -> bool {
        OrchestrationStatus::from(*self).is_terminal()
    }
}

impl From<OrchestrationStatus> for WireStatus {
    fn from(status: OrchestrationStatus) -> Self {
        match status {
            OrchestrationStatus::Pending => WireStatus::Pending,
            OrchestrationStatus::Running => WireStatus::Running,
            OrchestrationStatus::Suspended => WireStatus::Suspended,
            OrchestrationStatus::Completed => WireStatus::Completed,
            OrchestrationStatus::Failed => WireStatus::Failed,
            OrchestrationStatus::Terminated => WireStatus::Terminated,
            OrchestrationStatus::Canceled => WireStatus::Canceled,
            OrchestrationStatus::ContinuedAsNew => WireStatus::ContinuedAsNew,
        }
    }
}

impl From<WireStatus> for OrchestrationStatus {
    fn from(status: WireStatus) -> Self {
        match status {
            WireStatus::Pending => OrchestrationStatus::Pending,
            WireStatus::Running => OrchestrationStatus::Running,
            WireStatus::Suspended => OrchestrationStatus::Suspended,
            WireStatus::Completed => OrchestrationStatus::Completed,
            WireStatus::Failed => OrchestrationStatus::Failed,
            WireStatus::Terminated => OrchestrationStatus::Terminated,
            WireStatus::Canceled => OrchestrationStatus::Canceled,
            WireStatus::ContinuedAsNew => OrchestrationStatus::ContinuedAsNew,
        }
    }
}

/// Error codes surfaced to remote callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    InvalidArgument,
    AlreadyExists,
    Cancelled,
    Unsupported,
    Internal,
}

dt_core::simple_display! {
    ErrorCode {
        NotFound => "NOT_FOUND",
        InvalidArgument => "INVALID_ARGUMENT",
        AlreadyExists => "ALREADY_EXISTS",
        Cancelled => "CANCELLED",
        Unsupported => "UNSUPPORTED",
        Internal => "INTERNAL",
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
