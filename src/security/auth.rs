//! Connection authentication hook.
//!
//! # Responsibilities
//! - Decide, per fully-read request, whether a connection may proceed
//! - Ship the shared-secret policy used by local session clients
//!
//! # Design Decisions
//! - Policy is a trait object so deployments plug their own check
//! - Runs on the listener thread before classification; rejected connections
//!   get a 403 and are never queued
//! - Secret comparison is constant time

use crate::http::request::SessionRequest;

/// Header carrying the client's copy of the shared secret.
pub const SESSION_SECRET_HEADER: &str = "x-session-secret";

/// Per-connection authentication decision.
pub trait AuthPolicy: Send + Sync {
    /// Whether this request's connection may proceed.
    fn authenticate(&self, request: &SessionRequest) -> bool;
}

/// Accepts every connection. The default when no secret is configured; the
/// transport (loopback or socket permissions) is the gate.
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissiveAuth;

impl AuthPolicy for PermissiveAuth {
    fn authenticate(&self, _request: &SessionRequest) -> bool {
        true
    }
}

/// Accepts connections presenting the configured shared secret.
#[derive(Debug, Clone)]
pub struct SharedSecretAuth {
    secret: String,
}

impl SharedSecretAuth {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl AuthPolicy for SharedSecretAuth {
    fn authenticate(&self, request: &SessionRequest) -> bool {
        match request.header(SESSION_SECRET_HEADER) {
            Some(presented) => constant_time_eq(presented.as_bytes(), self.secret.as_bytes()),
            None => false,
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
