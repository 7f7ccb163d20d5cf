// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dt-core: Data model for the durable task engine
//!
//! Instance identity, history events, task messages, orchestrator actions,
//! runtime state, and the pure action applier that turns a worker's action
//! batch into history events and outbound messages.

pub mod macros;

pub mod action;
pub mod apply;
pub mod clock;
pub mod failure;
pub mod guid;
pub mod history;
pub mod instance;
pub mod message;
pub mod state;
pub mod status;
pub mod work_item;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use action::{ActionKind, CompletionOutcome, OrchestratorAction};
pub use apply::{apply_actions, ApplyError, ApplyOutcome};
pub use clock::{Clock, FakeClock, SystemClock};
pub use failure::TaskFailureDetails;
pub use guid::{deterministic_guid, GUID_NAMESPACE};
pub use history::{EventKind, HistoryEvent, SYSTEM_EVENT_ID};
pub use instance::{activity_dispatch_id, OrchestrationInstance, ParentInfo, TaskName};
pub use message::{TaskMessage, WorkMessage};
pub use state::RuntimeState;
pub use status::OrchestrationStatus;
pub use work_item::{ActivityWorkItem, OrchestratorWorkItem};
