// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hub configuration.

use std::time::Duration;

/// Hard cap on activity concurrency, matching the reference backend.
pub const ACTIVITY_BATCH_CAP: usize = 32;

/// Tunables accepted at the hub boundary.
#[derive(Debug, Clone)]
pub struct HubOptions {
    /// Bound of the dispatch queue between the store and worker streams.
    pub work_item_buffer_capacity: usize,
    /// Concurrent activity invocations per worker (capped at
    /// [`ACTIVITY_BATCH_CAP`]).
    pub activity_batch_size: usize,
    /// Renew an orchestration lock when it is this close to expiry.
    pub lock_renewal_window: Duration,
    /// Timers further out than this are parked by the hub and re-deferred.
    pub max_timer_interval: Duration,
}

impl Default for HubOptions {
    fn default() -> Self {
        Self {
            work_item_buffer_capacity: 100,
            activity_batch_size: 32,
            lock_renewal_window: Duration::from_secs(60),
            max_timer_interval: Duration::from_secs(3 * 24 * 60 * 60),
        }
    }
}

impl HubOptions {
    pub fn new() -> Self {
        Self::default()
    }

    dt_core::setters! {
        set {
            work_item_buffer_capacity: usize,
            lock_renewal_window: Duration,
            max_timer_interval: Duration,
        }
    }

    /// Set the activity batch size, clamped to the hard cap.
    pub fn activity_batch_size(mut self, v: usize) -> Self {
        self.activity_batch_size = v.min(ACTIVITY_BATCH_CAP);
        self
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
