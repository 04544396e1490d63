//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound connection
//!     → transport.rs (bind/accept, peer validation)
//!     → listener.rs (accept loop, classification, privileged endpoints)
//!     → connection.rs (request snapshot + one-shot response path)
//!     → queue.rs (FIFO hand-off to foreground consumers)
//!
//! Connection states:
//!     Accepting → Validating → Reading → Classified | Rejected
//! ```
//!
//! # Design Decisions
//! - One accept in flight; the loop re-arms after every completion
//! - Privileged endpoints answered on the listener thread, before queueing
//! - Queues are the only hand-off between the listener and consumers

pub mod connection;
pub mod listener;
pub mod queue;
pub mod transport;
