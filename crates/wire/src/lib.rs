// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol for hub ↔ worker and hub ↔ client connections.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod codec;
mod frame;
mod request;
mod response;
mod types;

pub use codec::{decode, encode, read_frame, read_message, write_message, ProtocolError};
pub use frame::WorkItemFrame;
pub use request::{ActivityResult, ClientRequest, OrchestratorResult, QueryFilter, WorkerRequest};
pub use response::{OrchestrationInfo, Response};
pub use types::{ErrorCode, TaskError, WireStatus};
