// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hub error taxonomy.

use dt_core::ApplyError;
use dt_store::StoreError;
use dt_wire::ErrorCode;
use thiserror::Error;

/// Errors surfaced by dispatcher operations.
#[derive(Debug, Error)]
pub enum HubError {
    /// Completion for a work item the hub is not tracking.
    #[error("no pending work item: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("action batch rejected: {0}")]
    Apply(#[from] ApplyError),

    #[error("hub is shutting down")]
    Canceled,
}

impl HubError {
    /// Wire error code for remote callers.
    pub fn code(&self) -> ErrorCode {
        match self {
            HubError::NotFound(_) => ErrorCode::NotFound,
            HubError::InvalidArgument(_) | HubError::Apply(_) => ErrorCode::InvalidArgument,
            HubError::Canceled => ErrorCode::Cancelled,
            HubError::Store(e) => match e {
                StoreError::NotFound(_) => ErrorCode::NotFound,
                StoreError::AlreadyExists(_) => ErrorCode::AlreadyExists,
                StoreError::InvalidArgument(_) => ErrorCode::InvalidArgument,
                StoreError::Canceled | StoreError::Timeout(_) => ErrorCode::Cancelled,
                StoreError::Unsupported(_) => ErrorCode::Unsupported,
                StoreError::LockLost(_) => ErrorCode::Internal,
            },
        }
    }
}
