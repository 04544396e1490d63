//! OS signal masking for background threads.
//!
//! # Responsibilities
//! - Block signal delivery for threads spawned while the blocker is held
//! - Restore the caller's signal mask on drop
//!
//! # Design Decisions
//! - Termination signals must land on the threads that already handle them,
//!   never on the listener thread
//! - The mask is inherited at spawn, so blocking brackets only the spawn call
//! - No-op on platforms without pthread signal masks

/// RAII guard that blocks all signals for the current thread.
///
/// Threads spawned while the guard is alive inherit the blocked mask and
/// keep it; the spawning thread's mask is restored when the guard drops.
#[derive(Debug)]
pub struct SignalBlocker {
    #[cfg(unix)]
    previous: libc::sigset_t,
}

impl SignalBlocker {
    #[cfg(unix)]
    pub fn block_all() -> Self {
        // sigfillset/pthread_sigmask only read and write the sets passed in.
        unsafe {
            let mut all: libc::sigset_t = std::mem::zeroed();
            libc::sigfillset(&mut all);
            let mut previous: libc::sigset_t = std::mem::zeroed();
            libc::pthread_sigmask(libc::SIG_BLOCK, &all, &mut previous);
            Self { previous }
        }
    }

    #[cfg(not(unix))]
    pub fn block_all() -> Self {
        Self {}
    }
}

#[cfg(unix)]
impl Drop for SignalBlocker {
    fn drop(&mut self) {
        unsafe {
            libc::pthread_sigmask(libc::SIG_SETMASK, &self.previous, std::ptr::null_mut());
        }
    }
}
