// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store error taxonomy, shared by every backend.

use thiserror::Error;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed instance, execution, or work item does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Instance creation was deduplicated against an existing record.
    #[error("instance already exists: {0}")]
    AlreadyExists(String),

    /// The caller passed something the store cannot act on.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation's cancellation token fired.
    #[error("operation canceled")]
    Canceled,

    /// `wait_for_terminal` gave up before the instance finished.
    #[error("timed out waiting for {0}")]
    Timeout(String),

    /// A lock token no longer matches the current lock holder.
    #[error("lock conflict: {0}")]
    LockLost(String),

    /// The backend does not implement this admin operation.
    #[error("operation not supported by this store: {0}")]
    Unsupported(&'static str),
}

impl StoreError {
    /// Transient errors are worth retrying after a short delay; the rest
    /// are caller mistakes or final answers.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Canceled | StoreError::LockLost(_))
    }
}
