//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (listener.start()):
//!     Transport cleanup → Build engine → Bind → Block signals → Spawn thread
//!
//! Shutdown (listener.stop()):
//!     Signal engine → Join with timeout → Detach if stuck → Cleanup
//!
//! Signals (signals.rs):
//!     Listener thread runs with all signals blocked; delivery stays with
//!     the foreground threads
//!
//! Termination (terminate.rs):
//!     rpc/abort → ack flushed → Terminator::terminate()
//! ```
//!
//! # Design Decisions
//! - Shutdown has a bound: a stuck listener thread is detached, never waited
//!   on forever
//! - Process termination is injected, so tests intercept it

pub mod signals;
pub mod terminate;

pub use signals::SignalBlocker;
pub use terminate::{ProcessAbort, Terminator};
