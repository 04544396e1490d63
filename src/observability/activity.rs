//! Connection activity log.
//!
//! # Responsibilities
//! - Record connection lifecycle events (received, dequeued, responded)
//! - Bound memory by dropping the oldest entries past capacity
//! - Produce JSON snapshots for the diagnostic log endpoint

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::net::connection::ConnectionId;

/// Default number of entries retained by the activity log.
pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// Kind of connection activity being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    /// Connection accepted and its request fully read.
    Received,
    /// Connection handed to a consumer from one of the queues.
    Dequeued,
    /// Response sent back to the client.
    Responded,
}

/// One recorded activity event.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub id: ConnectionId,
    /// Milliseconds since the Unix epoch.
    pub time: u64,
}

/// Bounded in-memory log of connection activity.
///
/// Written from both the listener thread and queue consumers; reads produce
/// a point-in-time snapshot. Once `capacity` entries are held, recording a
/// new entry drops the oldest.
#[derive(Debug)]
pub struct ActivityLog {
    capacity: usize,
    entries: Mutex<VecDeque<ActivityEntry>>,
}

impl ActivityLog {
    /// Create a log retaining at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY))),
        }
    }

    /// Record one activity event for a connection.
    pub fn record(&self, kind: ActivityKind, id: ConnectionId) {
        let entry = ActivityEntry {
            kind,
            id,
            time: now_millis(),
        };
        let mut entries = self.lock();
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Copy out the current entries, oldest first.
    pub fn snapshot(&self) -> Vec<ActivityEntry> {
        self.lock().iter().cloned().collect()
    }

    /// Current entries as a JSON array.
    pub fn as_json(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot())
            .unwrap_or_else(|_| serde_json::Value::Array(Vec::new()))
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // Recording must survive a poisoned lock; a panicked writer leaves the
    // ring structurally intact.
    fn lock(&self) -> MutexGuard<'_, VecDeque<ActivityEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
