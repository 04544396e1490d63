//! Inbound request snapshot.
//!
//! # Responsibilities
//! - Hold a fully-read copy of one inbound HTTP request
//! - Expose the pieces classification and consumers need (path, headers, body)
//!
//! # Design Decisions
//! - The body is read to completion before the request is handed anywhere;
//!   queue consumers never touch the socket
//! - Owned data only, so the request can cross the queue thread boundary

use bytes::Bytes;
use hyper::{HeaderMap, Method, Uri};

/// A fully-read inbound request.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
}

impl SessionRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Request path, without the query string.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of the named header as UTF-8, if present and valid.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}
