//! Process termination signal.
//!
//! # Responsibilities
//! - Provide the single designated way the listener ends the process
//!
//! # Design Decisions
//! - Termination is an injected trait object, so tests observe the signal
//!   instead of dying
//! - The production signal is an abnormal abort, not a clean exit: an abort
//!   request means state cannot be trusted

/// The designated fatal-termination signal.
pub trait Terminator: Send + Sync {
    /// End the process. The production implementation does not return.
    fn terminate(&self);
}

/// Terminates by aborting the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessAbort;

impl Terminator for ProcessAbort {
    fn terminate(&self) {
        std::process::abort();
    }
}
