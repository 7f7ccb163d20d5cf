// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket-connected management client.

use crate::error::ClientError;
use dt_wire::{self as wire, ClientRequest, OrchestrationInfo, QueryFilter, Response};
use std::time::Duration;
use tokio::net::UnixStream;
use tokio::sync::Mutex;

/// Per-response read timeout.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);

/// A client over one hub socket connection. Requests are serialized; the
/// hub answers in order.
pub struct RemoteClient {
    stream: Mutex<UnixStream>,
}

impl RemoteClient {
    /// Connect and handshake.
    pub async fn connect(path: impl AsRef<std::path::Path>) -> Result<Self, ClientError> {
        let mut stream = UnixStream::connect(path.as_ref())
            .await
            .map_err(wire::ProtocolError::from)?;
        let hello =
            wire::encode(&ClientRequest::Hello { version: env!("CARGO_PKG_VERSION").into() })?;
        wire::write_message(&mut stream, &hello).await?;
        let ack: Response = wire::read_frame(&mut stream, RESPONSE_TIMEOUT).await?;
        match ack {
            Response::Ok => Ok(Self { stream: Mutex::new(stream) }),
            Response::Error { code, message } => Err(ClientError::Hub { code, message }),
            _ => Err(ClientError::UnexpectedResponse("hello")),
        }
    }

    /// Send one request and read its response.
    pub async fn call(&self, request: ClientRequest) -> Result<Response, ClientError> {
        let payload = wire::encode(&request)?;
        let mut stream = self.stream.lock().await;
        wire::write_message(&mut *stream, &payload).await?;
        Ok(wire::read_frame(&mut *stream, RESPONSE_TIMEOUT).await?)
    }

    pub async fn get(
        &self,
        instance_id: &str,
        expand_history: bool,
    ) -> Result<OrchestrationInfo, ClientError> {
        let response = self
            .call(ClientRequest::Get { instance_id: instance_id.to_string(), expand_history })
            .await?;
        match response {
            Response::Instance { info } => Ok(*info),
            Response::Error { code, message } => Err(ClientError::Hub { code, message }),
            _ => Err(ClientError::UnexpectedResponse("get")),
        }
    }

    pub async fn query(
        &self,
        filter: QueryFilter,
    ) -> Result<(Vec<OrchestrationInfo>, Option<String>), ClientError> {
        match self.call(ClientRequest::Query { filter }).await? {
            Response::Page { instances, continuation } => Ok((instances, continuation)),
            Response::Error { code, message } => Err(ClientError::Hub { code, message }),
            _ => Err(ClientError::UnexpectedResponse("query")),
        }
    }
}
