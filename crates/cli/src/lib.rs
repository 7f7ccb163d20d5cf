// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dt-client: management client for a task hub.
//!
//! `TaskHubClient` talks to an in-process store; `RemoteClient` speaks the
//! same requests over a hub socket. Both express the client service:
//! schedule, get, wait, raise, terminate, suspend/resume, query, purge.

mod client;
mod error;
mod remote;

pub use client::{ScheduleOptions, TaskHubClient};
pub use error::ClientError;
pub use remote::RemoteClient;
