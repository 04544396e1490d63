//! Accepted connection wrapper and lifecycle.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing and the activity log
//! - Carry a fully-read request from the listener thread to a consumer
//! - Deliver exactly one response back to the connection's write task
//!
//! # Design Decisions
//! - Responding consumes the connection; a second response cannot compile
//! - Dropping an unanswered connection closes it without a response

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::http::request::SessionRequest;
use crate::http::response::SessionResponse;
use crate::http::rpc::RpcResponse;
use crate::observability::activity::{ActivityKind, ActivityLog};

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error delivering a response over a connection.
#[derive(Debug, Error)]
pub enum SendError {
    /// The write task went away, usually because the client disconnected.
    #[error("connection {id} closed before the response could be sent")]
    Closed { id: ConnectionId },
}

/// One accepted connection with its request fully read.
///
/// Created on the listener thread once the request is parsed. Ownership then
/// moves through a queue to a consumer, which responds exactly once.
#[derive(Debug)]
pub struct HttpConnection {
    id: ConnectionId,
    request: SessionRequest,
    peer: String,
    responder: oneshot::Sender<SessionResponse>,
    activity: Arc<ActivityLog>,
}

impl HttpConnection {
    /// Wrap a request. The returned receiver resolves in the connection's
    /// write task once a response is sent.
    pub fn new(
        request: SessionRequest,
        peer: String,
        activity: Arc<ActivityLog>,
    ) -> (Self, oneshot::Receiver<SessionResponse>) {
        let (responder, response_rx) = oneshot::channel();
        let connection = Self {
            id: ConnectionId::new(),
            request,
            peer,
            responder,
            activity,
        };
        (connection, response_rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn request(&self) -> &SessionRequest {
        &self.request
    }

    /// Peer description for logs.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Send the response, consuming the connection.
    pub fn send_response(self, response: SessionResponse) -> Result<(), SendError> {
        let Self {
            id,
            responder,
            activity,
            ..
        } = self;
        match responder.send(response) {
            Ok(()) => {
                activity.record(ActivityKind::Responded, id);
                Ok(())
            }
            Err(_) => Err(SendError::Closed { id }),
        }
    }

    /// Send a JSON-RPC response, consuming the connection.
    pub fn send_json_rpc(self, response: RpcResponse) -> Result<(), SendError> {
        self.send_response(response.into_http())
    }
}
