// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! Accepts worker and client connections without blocking the dispatch
//! loops. A connection's first frame is its handshake: a `WorkerRequest`
//! turns it into a long-lived work-item stream, a `ClientRequest` into a
//! request/response management session.

use crate::dispatch::{DispatchedWorkItem, HubDispatcher};
use crate::error::HubError;
use dt_core::{EventKind, HistoryEvent, OrchestrationInstance, OrchestrationStatus, TaskMessage};
use dt_store::{OrchestrationQuery, Store, StoreError};
use dt_wire::{
    self as wire, ClientRequest, OrchestrationInfo, ProtocolError, QueryFilter, Response,
    WorkItemFrame, WorkerRequest,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, UnixListener};
use tracing::{debug, error, warn};

/// Per-request read timeout on client connections.
const CLIENT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Socket front door for the hub.
pub struct HubListener {
    unix: UnixListener,
    tcp: Option<TcpListener>,
    hub: Arc<HubDispatcher>,
}

impl HubListener {
    /// Listener on a Unix socket only.
    pub fn new(unix: UnixListener, hub: Arc<HubDispatcher>) -> Self {
        Self { unix, tcp: None, hub }
    }

    /// Listener on both a Unix socket and TCP.
    pub fn with_tcp(unix: UnixListener, tcp: TcpListener, hub: Arc<HubDispatcher>) -> Self {
        Self { unix, tcp: Some(tcp), hub }
    }

    /// Run the accept loop, spawning a task per connection.
    pub async fn run(mut self) {
        match self.tcp.take() {
            Some(tcp) => self.run_dual(tcp).await,
            None => self.run_unix_only().await,
        }
    }

    async fn run_unix_only(self) {
        loop {
            match self.unix.accept().await {
                Ok((stream, _)) => {
                    let hub = Arc::clone(&self.hub);
                    tokio::spawn(async move {
                        let (reader, writer) = stream.into_split();
                        if let Err(e) = handle_connection(reader, writer, hub).await {
                            log_connection_error(e);
                        }
                    });
                }
                Err(e) => error!("Unix accept error: {}", e),
            }
        }
    }

    async fn run_dual(self, tcp: TcpListener) {
        loop {
            tokio::select! {
                result = self.unix.accept() => {
                    match result {
                        Ok((stream, _)) => {
                            let hub = Arc::clone(&self.hub);
                            tokio::spawn(async move {
                                let (reader, writer) = stream.into_split();
                                if let Err(e) = handle_connection(reader, writer, hub).await {
                                    log_connection_error(e);
                                }
                            });
                        }
                        Err(e) => error!("Unix accept error: {}", e),
                    }
                }
                result = tcp.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            debug!("TCP connection from {}", addr);
                            let hub = Arc::clone(&self.hub);
                            tokio::spawn(async move {
                                let (reader, writer) = stream.into_split();
                                if let Err(e) = handle_connection(reader, writer, hub).await {
                                    log_connection_error(e);
                                }
                            });
                        }
                        Err(e) => error!("TCP accept error: {}", e),
                    }
                }
            }
        }
    }
}

fn log_connection_error(e: ProtocolError) {
    match e {
        ProtocolError::ConnectionClosed => debug!("peer disconnected"),
        ProtocolError::Timeout => warn!("connection timeout"),
        _ => error!("connection error: {}", e),
    }
}

/// Handle one connection: demux on the handshake frame.
async fn handle_connection<R, W>(
    mut reader: R,
    writer: W,
    hub: Arc<HubDispatcher>,
) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let first = wire::read_message(&mut reader).await?;
    if let Ok(WorkerRequest::Hello { version }) = wire::decode::<WorkerRequest>(&first) {
        debug!(%version, "worker connected");
        return handle_worker(reader, writer, hub).await;
    }
    if let Ok(ClientRequest::Hello { version }) = wire::decode::<ClientRequest>(&first) {
        debug!(%version, "client connected");
        return handle_client(reader, writer, hub).await;
    }
    Err(ProtocolError::ConnectionClosed)
}

/// Worker connection: stream work items out, consume completions in.
/// Completions are one-way; failures are logged and the work item is
/// eventually retried via the store's lock expiry.
async fn handle_worker<R, W>(
    mut reader: R,
    mut writer: W,
    hub: Arc<HubDispatcher>,
) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut stream = hub.work_item_stream();
    let writer_task = tokio::spawn(async move {
        loop {
            match stream.next().await {
                Some(DispatchedWorkItem::Activity(item)) => {
                    let frame = WorkItemFrame::Activity { item };
                    if write_frame(&mut writer, &frame).await.is_err() {
                        break;
                    }
                }
                Some(DispatchedWorkItem::Orchestrator(mut turn)) => {
                    // Serialize the turn whole: drain the currently seeded
                    // messages into the work item. Later carry-over stays
                    // hub-side and joins the next turn.
                    let mut messages = Vec::new();
                    while let Ok(msg) = turn.messages.try_recv() {
                        messages.push(msg);
                    }
                    turn.item.new_messages = messages;
                    let frame = WorkItemFrame::Orchestrator { item: Box::new(turn.item) };
                    if write_frame(&mut writer, &frame).await.is_err() {
                        break;
                    }
                }
                None => {
                    let _ = write_frame(&mut writer, &WorkItemFrame::Shutdown).await;
                    break;
                }
            }
        }
    });

    let result = loop {
        let payload = match wire::read_message(&mut reader).await {
            Ok(payload) => payload,
            Err(e) => break Err(e),
        };
        match wire::decode::<WorkerRequest>(&payload)? {
            WorkerRequest::Hello { .. } => {}
            WorkerRequest::CompleteActivity { result } => {
                if let Err(e) = hub.complete_activity_task(result).await {
                    warn!(error = %e, "activity completion rejected");
                }
            }
            WorkerRequest::CompleteOrchestrator { result } => {
                if let Err(e) = hub.complete_orchestrator_task(result).await {
                    warn!(error = %e, "orchestrator completion rejected");
                }
            }
        }
    };
    writer_task.abort();
    match result {
        Err(ProtocolError::ConnectionClosed) => Ok(()),
        other => other,
    }
}

/// Client connection: framed request/response until disconnect.
async fn handle_client<R, W>(
    mut reader: R,
    mut writer: W,
    hub: Arc<HubDispatcher>,
) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    // Ack the handshake.
    write_response(&mut writer, &Response::Ok).await?;
    loop {
        let request: ClientRequest =
            match wire::read_frame(&mut reader, CLIENT_READ_TIMEOUT).await {
                Ok(request) => request,
                Err(ProtocolError::ConnectionClosed) => return Ok(()),
                Err(e) => return Err(e),
            };
        let response = handle_client_request(hub.store(), request, hub.now()).await;
        write_response(&mut writer, &response).await?;
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &WorkItemFrame,
) -> Result<(), ProtocolError> {
    let payload = wire::encode(frame)?;
    wire::write_message(writer, &payload).await
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
) -> Result<(), ProtocolError> {
    let payload = wire::encode(response)?;
    wire::write_message(writer, &payload).await
}

/// Execute one management request against the store.
pub async fn handle_client_request(
    store: &Arc<dyn Store>,
    request: ClientRequest,
    now: chrono::DateTime<chrono::Utc>,
) -> Response {
    match dispatch_client_request(store, request, now).await {
        Ok(response) => response,
        Err(e) => Response::error(e.code(), e.to_string()),
    }
}

async fn dispatch_client_request(
    store: &Arc<dyn Store>,
    request: ClientRequest,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Response, HubError> {
    match request {
        ClientRequest::Hello { .. } => Ok(Response::Ok),

        ClientRequest::Schedule { name, instance_id, input, tags, start_at, dedupe_statuses } => {
            if name.is_empty() {
                return Err(HubError::InvalidArgument("empty orchestration name".into()));
            }
            let instance = match instance_id {
                Some(id) if id.is_empty() => {
                    return Err(HubError::InvalidArgument("empty instance id".into()));
                }
                Some(id) => OrchestrationInstance::new(id),
                None => OrchestrationInstance::random(),
            };
            let start = TaskMessage::new(
                instance.clone(),
                HistoryEvent::system(
                    now,
                    EventKind::ExecutionStarted {
                        name,
                        input,
                        parent: None,
                        tags,
                        scheduled_start_time: start_at,
                    },
                ),
            );
            let dedupe: Vec<OrchestrationStatus> =
                dedupe_statuses.into_iter().map(Into::into).collect();
            store.create_instance(start, &dedupe).await?;
            let info = fetch_info(store, &instance.instance_id, false).await?;
            Ok(Response::Instance { info: Box::new(info) })
        }

        ClientRequest::Get { instance_id, expand_history } => {
            let info = fetch_info(store, &instance_id, expand_history).await?;
            Ok(Response::Instance { info: Box::new(info) })
        }

        ClientRequest::WaitForState { instance_id, states, timeout_ms } => {
            let ct = tokio_util::sync::CancellationToken::new();
            let timeout = Duration::from_millis(timeout_ms);
            if states.is_empty() {
                let state = store.wait_for_terminal(&instance_id, timeout, &ct).await?;
                return Ok(Response::Instance {
                    info: Box::new(OrchestrationInfo::from_state(&state, false)),
                });
            }
            // Poll for a non-terminal target state set.
            let wanted: Vec<OrchestrationStatus> = states.into_iter().map(Into::into).collect();
            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                if let Some(state) = store.get_state(&instance_id, None).await? {
                    if wanted.contains(&state.runtime_status) {
                        return Ok(Response::Instance {
                            info: Box::new(OrchestrationInfo::from_state(&state, false)),
                        });
                    }
                }
                if tokio::time::Instant::now() >= deadline {
                    return Err(HubError::Store(StoreError::Timeout(instance_id)));
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        }

        ClientRequest::RaiseEvent { instance_id, name, input } => {
            if instance_id.is_empty() {
                return Err(HubError::InvalidArgument("empty instance id".into()));
            }
            store
                .append_message(TaskMessage::new(
                    OrchestrationInstance::with_execution(instance_id, ""),
                    HistoryEvent::system(now, EventKind::EventRaised { name, input }),
                ))
                .await?;
            Ok(Response::Ok)
        }

        ClientRequest::Terminate { instance_id, reason } => {
            store.force_terminate(&instance_id, reason).await?;
            Ok(Response::Ok)
        }

        ClientRequest::Suspend { instance_id, reason } => {
            store
                .append_message(TaskMessage::new(
                    OrchestrationInstance::with_execution(instance_id, ""),
                    HistoryEvent::system(now, EventKind::ExecutionSuspended { reason }),
                ))
                .await?;
            Ok(Response::Ok)
        }

        ClientRequest::Resume { instance_id, reason } => {
            store
                .append_message(TaskMessage::new(
                    OrchestrationInstance::with_execution(instance_id, ""),
                    HistoryEvent::system(now, EventKind::ExecutionResumed { reason }),
                ))
                .await?;
            Ok(Response::Ok)
        }

        ClientRequest::Query { filter } => {
            let page = store.query(&to_query(filter)).await?;
            Ok(Response::Page {
                instances: page
                    .instances
                    .iter()
                    .map(|s| OrchestrationInfo::from_state(s, false))
                    .collect(),
                continuation: page.continuation,
            })
        }

        ClientRequest::Purge { instance_id: Some(id), .. } => {
            let count = store.purge(&id).await?;
            Ok(Response::Purged { count })
        }

        ClientRequest::Purge { instance_id: None, filter } => {
            let query = to_query(filter.unwrap_or_default());
            let count = store.purge_matching(&query).await?;
            Ok(Response::Purged { count })
        }
    }
}

async fn fetch_info(
    store: &Arc<dyn Store>,
    instance_id: &str,
    expand_history: bool,
) -> Result<OrchestrationInfo, HubError> {
    match store.get_state(instance_id, None).await? {
        Some(state) => Ok(OrchestrationInfo::from_state(&state, expand_history)),
        None => Err(HubError::Store(StoreError::NotFound(instance_id.to_string()))),
    }
}

fn to_query(filter: QueryFilter) -> OrchestrationQuery {
    let mut query = OrchestrationQuery::new()
        .statuses(filter.statuses.into_iter().map(Into::into).collect());
    if let Some(from) = filter.created_from {
        query = query.created_from(from);
    }
    if let Some(to) = filter.created_to {
        query = query.created_to(to);
    }
    if let Some(prefix) = filter.instance_id_prefix {
        query = query.instance_id_prefix(prefix);
    }
    if let Some(size) = filter.page_size {
        query = query.page_size(size);
    }
    if let Some(token) = filter.continuation {
        query = query.continuation(token);
    }
    query
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
