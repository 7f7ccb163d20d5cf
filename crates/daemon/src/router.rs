// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-instance message router.
//!
//! Maps `instance_id → dispatcher`, where a dispatcher is the sending half
//! of an in-flight session's inbound channel. Messages that arrive for an
//! instance with an active session are consumed inside that turn instead
//! of waiting for the next one.

use dt_core::WorkMessage;
use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// Router over in-flight sessions.
pub struct MessageRouter {
    dispatchers: Mutex<HashMap<String, mpsc::UnboundedSender<WorkMessage>>>,
}

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("a dispatcher is already registered for {0}")]
    AlreadyRegistered(String),
}

impl MessageRouter {
    pub fn new() -> Self {
        Self { dispatchers: Mutex::new(HashMap::new()) }
    }

    /// Register a dispatcher for an instance, pre-seeded with `first`.
    /// Returns the reading half for the session.
    pub fn initialize(
        &self,
        first: WorkMessage,
    ) -> Result<mpsc::UnboundedReceiver<WorkMessage>, RouterError> {
        let instance_id = first.dispatch_id.clone();
        let mut dispatchers = self.dispatchers.lock();
        if dispatchers.contains_key(&instance_id) {
            return Err(RouterError::AlreadyRegistered(instance_id));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive by construction; the seed cannot fail.
        let _ = tx.send(first);
        dispatchers.insert(instance_id, tx);
        Ok(rx)
    }

    /// Deliver a message to the instance's dispatcher. Returns true iff a
    /// dispatcher exists and accepted it.
    pub fn deliver(&self, instance_id: &str, msg: WorkMessage) -> bool {
        let dispatchers = self.dispatchers.lock();
        match dispatchers.get(instance_id) {
            Some(tx) => tx.send(msg).is_ok(),
            None => false,
        }
    }

    /// Drop the dispatcher for an instance (session released).
    pub fn remove(&self, instance_id: &str) {
        if self.dispatchers.lock().remove(instance_id).is_some() {
            debug!(instance = instance_id, "router dispatcher removed");
        }
    }

    pub fn is_registered(&self, instance_id: &str) -> bool {
        self.dispatchers.lock().contains_key(instance_id)
    }
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
