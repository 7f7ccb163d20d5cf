// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory store: the reference backend used by tests and local runs.
//!
//! All state lives under one mutex. Ready-to-run signaling is an atomic
//! offer+mark: enqueue inserts the message and wakes dequeuers under the
//! same lock acquisition, so a concurrent dequeue can never drop an
//! enqueue.

use crate::error::StoreError;
use crate::query::{OrchestrationQuery, QueryPage};
use crate::store::{Store, TurnCommit};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dt_core::{
    ActivityWorkItem, Clock, EventKind, HistoryEvent, OrchestrationStatus, OrchestratorWorkItem,
    RuntimeState, SystemClock, TaskMessage, TaskName, WorkMessage,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How long an orchestration lock lasts before another dequeue may steal it.
const LOCK_TIMEOUT_SECS: i64 = 30;

/// Re-enqueue delay for abandoned activity invocations.
const ACTIVITY_ABANDON_DELAY: Duration = Duration::from_secs(1);

/// Upper bound on dequeue sleep so deferred messages are noticed even
/// under a test clock.
const MAX_IDLE_WAIT: Duration = Duration::from_millis(500);

/// In-memory orchestration store.
pub struct InMemoryStore<C: Clock = SystemClock> {
    clock: C,
    inner: Arc<Mutex<Inner>>,
    orchestrations_ready: Arc<Notify>,
    activities_ready: Arc<Notify>,
    state_changed: Arc<Notify>,
}

struct Inner {
    instances: HashMap<String, InstanceRecord>,
    activity_queue: VecDeque<ActivityWorkItem>,
    locked_activities: HashMap<String, ActivityWorkItem>,
}

struct InstanceRecord {
    state: RuntimeState,
    pending: Vec<PendingMessage>,
    lock: Option<TurnLock>,
}

struct PendingMessage {
    receipt: String,
    msg: TaskMessage,
    visible_at: Option<DateTime<Utc>>,
    /// Out with a locked work item, awaiting commit or abandon.
    dispatched: bool,
}

struct TurnLock {
    token: String,
    expires_at: DateTime<Utc>,
}

impl InstanceRecord {
    fn new(state: RuntimeState) -> Self {
        Self { state, pending: Vec::new(), lock: None }
    }

    fn push_message(&mut self, msg: TaskMessage) {
        let visible_at = msg.visible_at();
        self.pending.push(PendingMessage {
            receipt: nanoid::nanoid!(12),
            msg,
            visible_at,
            dispatched: false,
        });
    }

    fn lock_is_free(&self, now: DateTime<Utc>) -> bool {
        match &self.lock {
            Some(lock) => lock.expires_at <= now,
            None => true,
        }
    }

    /// While suspended, only resume/terminate make the instance runnable.
    fn accepts_while_suspended(kind: &EventKind) -> bool {
        matches!(
            kind,
            EventKind::ExecutionResumed { .. } | EventKind::ExecutionTerminated { .. }
        )
    }

    fn message_runnable(&self, m: &PendingMessage, now: DateTime<Utc>) -> bool {
        if m.dispatched || m.visible_at.is_some_and(|at| at > now) {
            return false;
        }
        if self.state.runtime_status == OrchestrationStatus::Suspended {
            return Self::accepts_while_suspended(&m.msg.event.kind);
        }
        true
    }

    fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.lock_is_free(now) && self.pending.iter().any(|m| self.message_runnable(m, now))
    }

    /// Earliest instant a currently-invisible message becomes visible.
    fn next_visible_at(&self) -> Option<DateTime<Utc>> {
        self.pending.iter().filter(|m| !m.dispatched).filter_map(|m| m.visible_at).min()
    }
}

impl InMemoryStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for InMemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> InMemoryStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            inner: Arc::new(Mutex::new(Inner {
                instances: HashMap::new(),
                activity_queue: VecDeque::new(),
                locked_activities: HashMap::new(),
            })),
            orchestrations_ready: Arc::new(Notify::new()),
            activities_ready: Arc::new(Notify::new()),
            state_changed: Arc::new(Notify::new()),
        }
    }

    /// Deliver one message under the lock. Returns true when something
    /// became runnable.
    fn deliver(inner: &mut Inner, msg: TaskMessage) -> bool {
        let instance_id = msg.instance.instance_id.clone();
        match inner.instances.get_mut(&instance_id) {
            Some(record) => {
                if record.state.is_terminal() && !msg.is_start() {
                    warn!(
                        instance = %instance_id,
                        kind = msg.event.kind.label(),
                        "dropping message for terminal instance"
                    );
                    return false;
                }
                record.push_message(msg);
                true
            }
            None if msg.is_start() => {
                let mut record = InstanceRecord::new(RuntimeState::new(msg.instance.clone()));
                record.push_message(msg);
                inner.instances.insert(instance_id, record);
                true
            }
            None => {
                warn!(
                    instance = %instance_id,
                    kind = msg.event.kind.label(),
                    "dropping message for unknown instance"
                );
                false
            }
        }
    }

    /// Find a ready instance, mark its runnable messages dispatched, and
    /// lock it. One atomic step under the store mutex.
    fn try_lock_orchestration(&self, inner: &mut Inner) -> Option<OrchestratorWorkItem> {
        let now = self.clock.now_utc();
        let instance_id = inner
            .instances
            .iter()
            .filter(|(_, r)| r.is_ready(now))
            .map(|(id, _)| id.clone())
            .min()?;
        let record = inner.instances.get_mut(&instance_id)?;

        // Stale-generation filtering happens at dispatch: messages stamped
        // with a dead execution id are consumed here, not handed out.
        let current = record.state.clone();
        record.pending.retain(|m| {
            if m.dispatched || m.visible_at.is_some_and(|at| at > now) {
                return true;
            }
            match current.rejects_inbound(&m.msg) {
                Some(reason) => {
                    warn!(instance = %instance_id, %reason, "discarding inbound message");
                    false
                }
                None => true,
            }
        });

        // A resume or terminate for a suspended instance releases the whole
        // buffered backlog into the same turn.
        let unblocked = current.runtime_status != OrchestrationStatus::Suspended
            || record.pending.iter().any(|m| {
                !m.dispatched
                    && !m.visible_at.is_some_and(|at| at > now)
                    && InstanceRecord::accepts_while_suspended(&m.msg.event.kind)
            });

        let mut new_messages = Vec::new();
        for m in record.pending.iter_mut() {
            let runnable =
                !m.dispatched && !m.visible_at.is_some_and(|at| at > now) && unblocked;
            if runnable {
                m.dispatched = true;
                new_messages.push(
                    WorkMessage::for_instance(m.msg.clone()).pop_receipt(m.receipt.clone()),
                );
            }
        }
        if new_messages.is_empty() {
            return None;
        }

        let token = nanoid::nanoid!(12);
        let expires_at = now + ChronoDuration::seconds(LOCK_TIMEOUT_SECS);
        record.lock = Some(TurnLock { token: token.clone(), expires_at });

        let name = if record.state.created_at.is_some() {
            record.state.name.clone()
        } else {
            start_name(&new_messages).unwrap_or_else(|| TaskName::new(""))
        };

        Some(OrchestratorWorkItem {
            instance: record.state.instance.clone(),
            name,
            parent: record.state.parent.clone(),
            replay_history: record.state.past_events.clone(),
            new_messages,
            metadata: record.state.tags.clone(),
            lock_token: token,
            lock_expires_at: Some(expires_at),
        })
    }

    /// Sleep bound for the dequeue loops: until the earliest deferred
    /// message is due, capped so test clocks are observed promptly.
    fn idle_wait(&self, inner: &Inner) -> Duration {
        let now = self.clock.now_utc();
        inner
            .instances
            .values()
            .filter_map(|r| r.next_visible_at())
            .min()
            .map(|due| (due - now).to_std().unwrap_or(Duration::ZERO).min(MAX_IDLE_WAIT))
            .unwrap_or(MAX_IDLE_WAIT)
    }

    fn verify_lock(record: &InstanceRecord, token: &str) -> Result<(), StoreError> {
        match &record.lock {
            Some(lock) if lock.token == token => Ok(()),
            _ => Err(StoreError::LockLost(record.state.instance.instance_id.clone())),
        }
    }
}

fn start_name(messages: &[WorkMessage]) -> Option<TaskName> {
    messages.iter().find_map(|m| match &m.message.event.kind {
        EventKind::ExecutionStarted { name, .. } => Some(name.clone()),
        _ => None,
    })
}

/// Build the activity work item implied by a TaskScheduled message.
fn activity_from_message(msg: &TaskMessage) -> Option<ActivityWorkItem> {
    match &msg.event.kind {
        EventKind::TaskScheduled { name, input } => Some(ActivityWorkItem {
            instance: msg.instance.clone(),
            name: name.clone(),
            task_id: msg.event.event_id,
            input: input.clone(),
            lock_token: nanoid::nanoid!(12),
        }),
        _ => None,
    }
}

#[async_trait]
impl<C: Clock> Store for InMemoryStore<C> {
    async fn create_instance(
        &self,
        start: TaskMessage,
        dedupe_statuses: &[OrchestrationStatus],
    ) -> Result<(), StoreError> {
        if !start.is_start() {
            return Err(StoreError::InvalidArgument(
                "create_instance requires an execution:started message".into(),
            ));
        }
        if start.instance.instance_id.is_empty() {
            return Err(StoreError::InvalidArgument("empty instance id".into()));
        }
        {
            let mut inner = self.inner.lock();
            if let Some(existing) = inner.instances.get(&start.instance.instance_id) {
                if dedupe_statuses.contains(&existing.state.runtime_status) {
                    return Err(StoreError::AlreadyExists(start.instance.instance_id.clone()));
                }
            }
            let mut record = InstanceRecord::new(RuntimeState::new(start.instance.clone()));
            record.push_message(start);
            inner.instances.insert(record.state.instance.instance_id.clone(), record);
        }
        self.orchestrations_ready.notify_waiters();
        self.state_changed.notify_waiters();
        Ok(())
    }

    async fn append_message(&self, msg: TaskMessage) -> Result<(), StoreError> {
        let became_ready = {
            let mut inner = self.inner.lock();
            Self::deliver(&mut inner, msg)
        };
        if became_ready {
            self.orchestrations_ready.notify_waiters();
        }
        Ok(())
    }

    async fn lock_next_activity(
        &self,
        ct: &CancellationToken,
    ) -> Result<ActivityWorkItem, StoreError> {
        loop {
            let notified = self.activities_ready.notified();
            {
                let mut inner = self.inner.lock();
                if let Some(wi) = inner.activity_queue.pop_front() {
                    inner.locked_activities.insert(wi.lock_token.clone(), wi.clone());
                    return Ok(wi);
                }
            }
            tokio::select! {
                _ = notified => {}
                _ = ct.cancelled() => return Err(StoreError::Canceled),
            }
        }
    }

    async fn lock_next_orchestration(
        &self,
        ct: &CancellationToken,
    ) -> Result<OrchestratorWorkItem, StoreError> {
        loop {
            let notified = self.orchestrations_ready.notified();
            let wait = {
                let mut inner = self.inner.lock();
                if let Some(wi) = self.try_lock_orchestration(&mut inner) {
                    debug!(instance = wi.instance_id(), messages = wi.new_messages.len(), "locked orchestration turn");
                    return Ok(wi);
                }
                self.idle_wait(&inner)
            };
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep(wait) => {}
                _ = ct.cancelled() => return Err(StoreError::Canceled),
            }
        }
    }

    async fn renew_orchestration_lock(
        &self,
        wi: &OrchestratorWorkItem,
    ) -> Result<DateTime<Utc>, StoreError> {
        let mut inner = self.inner.lock();
        let record = inner
            .instances
            .get_mut(wi.instance_id())
            .ok_or_else(|| StoreError::NotFound(wi.instance_id().to_string()))?;
        Self::verify_lock(record, &wi.lock_token)?;
        let expires_at = self.clock.now_utc() + ChronoDuration::seconds(LOCK_TIMEOUT_SECS);
        if let Some(lock) = record.lock.as_mut() {
            lock.expires_at = expires_at;
        }
        Ok(expires_at)
    }

    async fn release_orchestration_lock(
        &self,
        wi: &OrchestratorWorkItem,
    ) -> Result<(), StoreError> {
        {
            let mut inner = self.inner.lock();
            if let Some(record) = inner.instances.get_mut(wi.instance_id()) {
                if record.lock.as_ref().is_some_and(|l| l.token == wi.lock_token) {
                    record.lock = None;
                }
            }
        }
        self.orchestrations_ready.notify_waiters();
        Ok(())
    }

    async fn complete_orchestration(
        &self,
        wi: &OrchestratorWorkItem,
        commit: TurnCommit,
    ) -> Result<(), StoreError> {
        let has_activities = !commit.activity_messages.is_empty();
        {
            let mut inner = self.inner.lock();
            let record = inner
                .instances
                .get_mut(wi.instance_id())
                .ok_or_else(|| StoreError::NotFound(wi.instance_id().to_string()))?;
            Self::verify_lock(record, &wi.lock_token)?;

            let mut state = commit.state;
            state.commit();
            record.state = state;

            // The lock guarantees the dispatched set is exactly this turn's
            // consumed messages.
            record.pending.retain(|m| !m.dispatched);
            record.lock = None;

            for msg in &commit.activity_messages {
                if let Some(activity) = activity_from_message(msg) {
                    inner.activity_queue.push_back(activity);
                }
            }
            for msg in commit.orchestrator_messages.into_iter().chain(commit.timer_messages) {
                Self::deliver(&mut inner, msg);
            }
            debug!(
                instance = wi.instance_id(),
                status = %commit.updated_status,
                "committed orchestration turn"
            );
        }
        if has_activities {
            self.activities_ready.notify_waiters();
        }
        self.orchestrations_ready.notify_waiters();
        self.state_changed.notify_waiters();
        Ok(())
    }

    async fn abandon_orchestration(&self, wi: &OrchestratorWorkItem) -> Result<(), StoreError> {
        {
            let mut inner = self.inner.lock();
            let Some(record) = inner.instances.get_mut(wi.instance_id()) else {
                return Ok(());
            };
            for m in record.pending.iter_mut() {
                m.dispatched = false;
            }
            if record.lock.as_ref().is_some_and(|l| l.token == wi.lock_token) {
                record.lock = None;
            }
            debug!(instance = wi.instance_id(), "abandoned orchestration turn");
        }
        self.orchestrations_ready.notify_waiters();
        Ok(())
    }

    async fn complete_activity(
        &self,
        wi: &ActivityWorkItem,
        response: TaskMessage,
    ) -> Result<(), StoreError> {
        {
            let mut inner = self.inner.lock();
            if inner.locked_activities.remove(&wi.lock_token).is_none() {
                // Duplicate completion: the first one won.
                debug!(dispatch = %wi.dispatch_id(), "ignoring duplicate activity completion");
                return Ok(());
            }
            Self::deliver(&mut inner, response);
        }
        self.orchestrations_ready.notify_waiters();
        Ok(())
    }

    async fn abandon_activity(&self, wi: &ActivityWorkItem) -> Result<(), StoreError> {
        let removed = {
            let mut inner = self.inner.lock();
            inner.locked_activities.remove(&wi.lock_token)
        };
        let Some(activity) = removed else { return Ok(()) };

        let inner = Arc::clone(&self.inner);
        let ready = Arc::clone(&self.activities_ready);
        tokio::spawn(async move {
            tokio::time::sleep(ACTIVITY_ABANDON_DELAY).await;
            inner.lock().activity_queue.push_back(activity);
            ready.notify_waiters();
        });
        Ok(())
    }

    async fn get_state(
        &self,
        instance_id: &str,
        execution_id: Option<&str>,
    ) -> Result<Option<RuntimeState>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner.instances.get(instance_id).map(|r| r.state.clone()).filter(|state| {
            execution_id.is_none_or(|id| id == state.instance.execution_id)
        }))
    }

    async fn query(&self, query: &OrchestrationQuery) -> Result<QueryPage, StoreError> {
        let inner = self.inner.lock();
        let mut matching: Vec<RuntimeState> = inner
            .instances
            .values()
            .filter(|r| query.matches(&r.state))
            .map(|r| r.state.clone())
            .collect();
        matching.sort_by(|a, b| a.instance.instance_id.cmp(&b.instance.instance_id));

        let offset = query
            .continuation
            .as_deref()
            .map(str::parse::<usize>)
            .transpose()
            .map_err(|_| StoreError::InvalidArgument("bad continuation token".into()))?
            .unwrap_or(0);
        let page: Vec<RuntimeState> =
            matching.iter().skip(offset).take(query.page_size).cloned().collect();
        let next = offset + page.len();
        let continuation = (next < matching.len()).then(|| next.to_string());
        Ok(QueryPage { instances: page, continuation })
    }

    async fn purge(&self, instance_id: &str) -> Result<u64, StoreError> {
        let purged = {
            let mut inner = self.inner.lock();
            match inner.instances.get(instance_id) {
                Some(record) if record.state.is_terminal() => {
                    inner.instances.remove(instance_id);
                    1
                }
                _ => 0,
            }
        };
        Ok(purged)
    }

    async fn purge_matching(&self, query: &OrchestrationQuery) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock();
        let before = inner.instances.len() as u64;
        inner.instances.retain(|_, r| !(r.state.is_terminal() && query.matches(&r.state)));
        Ok(before - inner.instances.len() as u64)
    }

    async fn wait_for_terminal(
        &self,
        instance_id: &str,
        timeout: Duration,
        ct: &CancellationToken,
    ) -> Result<RuntimeState, StoreError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.state_changed.notified();
            {
                let inner = self.inner.lock();
                if let Some(record) = inner.instances.get(instance_id) {
                    if record.state.is_terminal() {
                        return Ok(record.state.clone());
                    }
                }
            }
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(StoreError::Timeout(instance_id.to_string()));
                }
                _ = ct.cancelled() => return Err(StoreError::Canceled),
            }
        }
    }

    async fn force_terminate(
        &self,
        instance_id: &str,
        reason: Option<String>,
    ) -> Result<(), StoreError> {
        let msg = {
            let inner = self.inner.lock();
            let record = inner
                .instances
                .get(instance_id)
                .ok_or_else(|| StoreError::NotFound(instance_id.to_string()))?;
            TaskMessage::new(
                record.state.instance.clone(),
                HistoryEvent::system(
                    self.clock.now_utc(),
                    EventKind::ExecutionTerminated { reason },
                ),
            )
        };
        self.append_message(msg).await
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
