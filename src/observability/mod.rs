//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Listener thread and queue consumers produce:
//!     → activity.rs (bounded ring of connection events)
//!     → logging.rs (structured log events via tracing)
//!
//! Consumers:
//!     → rpc/http_log endpoint (activity snapshot as JSON)
//!     → Log aggregation (stdout)
//! ```
//!
//! # Design Decisions
//! - Activity recording is cheap (mutex push, fixed capacity)
//! - No metrics endpoint; the activity log is the diagnostic surface

pub mod activity;
pub mod logging;

pub use activity::{ActivityKind, ActivityLog};
