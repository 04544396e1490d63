//! Pending-connection queues.
//!
//! # Responsibilities
//! - FIFO hand-off of connections from the listener thread to consumers
//! - Blocking, bounded-blocking, and non-blocking dequeue
//! - Wake every waiting consumer at shutdown
//!
//! # Design Decisions
//! - Condvar over an async channel: consumers are plain threads and must be
//!   able to park without a runtime
//! - Enqueue never blocks and never fails; after shutdown it drops the
//!   connection, which closes it without a response
//! - Remaining items stay dequeueable after shutdown; `None` means drained
//!   and closed

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::net::connection::HttpConnection;
use crate::observability::activity::{ActivityKind, ActivityLog};

/// Thread-safe FIFO of pending connections.
#[derive(Debug)]
pub struct ConnectionQueue {
    name: &'static str,
    state: Mutex<QueueState>,
    available: Condvar,
    activity: Arc<ActivityLog>,
}

#[derive(Debug)]
struct QueueState {
    items: VecDeque<HttpConnection>,
    open: bool,
}

impl ConnectionQueue {
    pub fn new(name: &'static str, activity: Arc<ActivityLog>) -> Self {
        Self {
            name,
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                open: true,
            }),
            available: Condvar::new(),
            activity,
        }
    }

    /// Queue name for logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Add a connection at the tail. Never blocks.
    pub fn enqueue(&self, connection: HttpConnection) {
        let mut state = self.lock();
        if !state.open {
            tracing::warn!(
                queue = self.name,
                id = %connection.id(),
                "Queue is shut down, dropping connection"
            );
            return;
        }
        tracing::debug!(
            queue = self.name,
            id = %connection.id(),
            depth = state.items.len() + 1,
            "Connection queued"
        );
        state.items.push_back(connection);
        drop(state);
        self.available.notify_one();
    }

    /// Wait for the next connection. Returns `None` once the queue is shut
    /// down and drained.
    pub fn dequeue(&self) -> Option<HttpConnection> {
        let mut state = self.lock();
        while state.items.is_empty() && state.open {
            state = match self.available.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        self.take_front(state)
    }

    /// Wait up to `timeout` for the next connection.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<HttpConnection> {
        let state = self.lock();
        let wait = self
            .available
            .wait_timeout_while(state, timeout, |s| s.items.is_empty() && s.open);
        let (state, _timed_out) = match wait {
            Ok(result) => result,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.take_front(state)
    }

    /// Take the next connection if one is ready, without waiting.
    pub fn try_dequeue(&self) -> Option<HttpConnection> {
        let state = self.lock();
        self.take_front(state)
    }

    /// Close the queue and wake all waiting consumers. Idempotent.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        if !state.open {
            return;
        }
        state.open = false;
        drop(state);
        self.available.notify_all();
        tracing::debug!(queue = self.name, "Queue shut down");
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    fn take_front(&self, mut state: MutexGuard<'_, QueueState>) -> Option<HttpConnection> {
        let connection = state.items.pop_front()?;
        drop(state);
        self.activity.record(ActivityKind::Dequeued, connection.id());
        Some(connection)
    }

    // A consumer that panicked while holding the lock must not wedge the
    // listener thread.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
