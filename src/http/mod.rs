//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted transport connection
//!     → hyper http1 (one request, keep-alive off)
//!     → request.rs (owned snapshot: method, path, headers, body)
//!     → [listener classifies and queues, or answers privileged endpoints]
//!     → rpc.rs (JSON-RPC envelope for RPC responses)
//!     → response.rs (HTTP response shapes)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod rpc;

pub use request::SessionRequest;
pub use response::SessionResponse;
pub use rpc::{RpcError, RpcRequest, RpcResponse};
