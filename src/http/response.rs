//! Response construction.
//!
//! # Responsibilities
//! - Build the small set of response shapes this server produces
//! - Map rejection outcomes to appropriate HTTP status codes
//!
//! # Design Decisions
//! - `Full` bodies only: every response here is small JSON or empty
//! - Constructors are infallible; status and headers are set by mutation

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};

/// Response type produced everywhere in this crate.
pub type SessionResponse = Response<Full<Bytes>>;

/// JSON response with the given status.
pub fn json(status: StatusCode, value: &serde_json::Value) -> SessionResponse {
    let body = serde_json::to_vec(value).unwrap_or_default();
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// 200 OK with a JSON body.
pub fn ok_json(value: &serde_json::Value) -> SessionResponse {
    json(StatusCode::OK, value)
}

/// 403 Forbidden, empty body. Sent to connections that fail authentication.
pub fn forbidden() -> SessionResponse {
    empty(StatusCode::FORBIDDEN)
}

/// 404 Not Found, empty body.
pub fn not_found() -> SessionResponse {
    empty(StatusCode::NOT_FOUND)
}

fn empty(status: StatusCode) -> SessionResponse {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}
