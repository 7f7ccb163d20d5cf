// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dt-hub: the hub-side dispatcher.
//!
//! Locks work items from the store, streams them to connected workers,
//! applies the results, and commits. One hub owns the pending-work maps
//! for its store; per-instance exclusivity comes from the store's lock.

mod config;
mod dispatch;
mod error;
mod latch;
mod listener;
mod router;
mod session;

pub use config::HubOptions;
pub use dispatch::{DispatchedWorkItem, HubDispatcher, OrchestratorTurn, WorkItemStream};
pub use error::HubError;
pub use latch::AsyncLatch;
pub use listener::{handle_client_request, HubListener};
pub use router::MessageRouter;
pub use session::Session;
