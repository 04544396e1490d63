//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection:
//!     → transport peer validation (loopback / socket permissions)
//!     → auth.rs (shared secret or custom policy, after the request is read)
//!     → Pass to classification
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any check failure
//! - Peer validation closes without a response; auth failure answers 403

pub mod auth;

pub use auth::{AuthPolicy, PermissiveAuth, SharedSecretAuth, SESSION_SECRET_HEADER};
