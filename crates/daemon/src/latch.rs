// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manual-reset async gate.
//!
//! Used by the dispatcher as "at least one reader available": producer
//! loops park on the latch while no worker stream is connected.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// A manual-reset asynchronous gate.
///
/// `set` releases all current waiters and leaves the gate open;
/// `pulse_all` releases all current waiters and leaves it closed. Waiters
/// never observe a gap between "released" and "re-armed": release swaps
/// the underlying notifier under the same lock that guards the state.
pub struct AsyncLatch {
    inner: Mutex<LatchState>,
}

struct LatchState {
    is_set: bool,
    /// Incremented on every release so late registrants notice they missed
    /// the wake.
    epoch: u64,
    notify: Arc<Notify>,
}

impl AsyncLatch {
    /// New latch in the unset state.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LatchState {
                is_set: false,
                epoch: 0,
                notify: Arc::new(Notify::new()),
            }),
        }
    }

    pub fn is_set(&self) -> bool {
        self.inner.lock().is_set
    }

    /// Open the gate and release all current waiters. No-op when already
    /// set.
    pub fn set(&self) {
        let mut state = self.inner.lock();
        if !state.is_set {
            state.is_set = true;
            state.epoch += 1;
            state.notify.notify_waiters();
        }
    }

    /// Close the gate. No-op when already unset.
    pub fn reset(&self) {
        self.inner.lock().is_set = false;
    }

    /// Release all pre-existing waiters and leave the gate unset: the old
    /// notifier is swapped out and resolved, so nobody can observe "set".
    pub fn pulse_all(&self) {
        let mut state = self.inner.lock();
        state.is_set = false;
        state.epoch += 1;
        let old = std::mem::replace(&mut state.notify, Arc::new(Notify::new()));
        old.notify_waiters();
    }

    /// Wait until the next release (or return immediately when already
    /// set). Cancellable.
    pub async fn wait(&self, ct: &CancellationToken) -> Result<(), LatchCanceled> {
        let (notify, entry_epoch) = {
            let state = self.inner.lock();
            if state.is_set {
                return Ok(());
            }
            (Arc::clone(&state.notify), state.epoch)
        };
        let notified = notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        // A release may have slipped in between dropping the lock and
        // registering; the epoch check catches it.
        if self.inner.lock().epoch != entry_epoch {
            return Ok(());
        }

        tokio::select! {
            _ = notified => Ok(()),
            _ = ct.cancelled() => Err(LatchCanceled),
        }
    }
}

impl Default for AsyncLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// The wait's cancellation token fired before the latch released it.
#[derive(Debug, PartialEq, Eq)]
pub struct LatchCanceled;

#[cfg(test)]
#[path = "latch_tests.rs"]
mod tests;
