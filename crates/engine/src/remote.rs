// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket-connected worker: the same runners, fed by wire frames instead
//! of the in-process stream.

use crate::activity::ActivityRunner;
use crate::cursor::TurnOutcome;
use crate::dispatch::execute_turn_batch;
use crate::registry::Registry;
use dt_wire::{self as wire, OrchestratorResult, ProtocolError, WorkItemFrame, WorkerRequest};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A worker that serves one hub connection.
pub struct RemoteWorker {
    registry: Arc<Registry>,
}

impl RemoteWorker {
    pub fn new(registry: Registry) -> Self {
        Self { registry: Arc::new(registry) }
    }

    /// Connect to a hub's Unix socket and serve until shutdown.
    pub async fn run_unix(
        &self,
        path: impl AsRef<std::path::Path>,
        ct: &CancellationToken,
    ) -> Result<(), ProtocolError> {
        let stream = UnixStream::connect(path.as_ref()).await?;
        let (reader, writer) = stream.into_split();
        self.serve(reader, writer, ct).await
    }

    /// Serve one framed connection: Hello, then work items in,
    /// completions out.
    pub async fn serve<R, W>(
        &self,
        mut reader: R,
        writer: W,
        ct: &CancellationToken,
    ) -> Result<(), ProtocolError>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let writer = Arc::new(Mutex::new(writer));
        send(&writer, &WorkerRequest::Hello { version: env!("CARGO_PKG_VERSION").into() })
            .await?;
        info!("worker connected to hub");

        loop {
            let payload = tokio::select! {
                payload = wire::read_message(&mut reader) => payload?,
                _ = ct.cancelled() => return Ok(()),
            };
            match wire::decode::<WorkItemFrame>(&payload)? {
                WorkItemFrame::Activity { item } => {
                    let registry = Arc::clone(&self.registry);
                    let writer = Arc::clone(&writer);
                    tokio::spawn(async move {
                        let result = ActivityRunner::run(&registry, &item).await;
                        if let Err(e) =
                            send(&writer, &WorkerRequest::CompleteActivity { result }).await
                        {
                            warn!(error = %e, "failed to send activity completion");
                        }
                    });
                }
                WorkItemFrame::Orchestrator { item } => {
                    let registry = Arc::clone(&self.registry);
                    let writer = Arc::clone(&writer);
                    tokio::spawn(async move {
                        let instance_id = item.instance.instance_id.clone();
                        let outcome = tokio::task::spawn_blocking(move || {
                            execute_turn_batch(registry, &item)
                        })
                        .await;
                        match outcome {
                            Ok(TurnOutcome::Actions { actions, custom_status }) => {
                                let result = OrchestratorResult {
                                    instance_id,
                                    actions,
                                    custom_status,
                                };
                                let request = WorkerRequest::CompleteOrchestrator { result };
                                if let Err(e) = send(&writer, &request).await {
                                    warn!(error = %e, "failed to send turn completion");
                                }
                            }
                            Ok(TurnOutcome::Abort) => {
                                // Disconnecting the turn without a completion
                                // leaves it to the store's lock expiry.
                                debug!(instance = %instance_id, "turn aborted");
                            }
                            Err(e) => warn!(instance = %instance_id, error = %e, "turn crashed"),
                        }
                    });
                }
                WorkItemFrame::OrchestratorMessage { .. }
                | WorkItemFrame::Resumed { .. }
                | WorkItemFrame::Disconnect { .. } => {
                    debug!("ignoring streamed-history frame on batch connection");
                }
                WorkItemFrame::Shutdown => {
                    info!("hub announced shutdown");
                    return Ok(());
                }
            }
        }
    }
}

async fn send<W: AsyncWrite + Unpin>(
    writer: &Arc<Mutex<W>>,
    request: &WorkerRequest,
) -> Result<(), ProtocolError> {
    let payload = wire::encode(request)?;
    let mut writer = writer.lock().await;
    wire::write_message(&mut *writer, &payload).await
}
