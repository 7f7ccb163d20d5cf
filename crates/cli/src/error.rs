// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client error taxonomy.

use dt_wire::{ErrorCode, ProtocolError};
use thiserror::Error;

/// Errors from management operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The hub answered with an error response.
    #[error("{code}: {message}")]
    Hub { code: ErrorCode, message: String },

    /// Transport failure on a remote connection.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The hub answered with a response shape the call does not expect.
    #[error("unexpected response for {0}")]
    UnexpectedResponse(&'static str),
}

impl ClientError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Hub { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == Some(ErrorCode::NotFound)
    }

    pub fn is_already_exists(&self) -> bool {
        self.code() == Some(ErrorCode::AlreadyExists)
    }
}
