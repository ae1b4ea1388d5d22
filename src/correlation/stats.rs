use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters of a running synchronizer.
#[derive(Debug, Default)]
pub struct SyncStats {
    requests: AtomicU64,
    responses: AtomicU64,
    delivered: AtomicU64,
    timeouts: AtomicU64,
    forward_failures: AtomicU64,
    rejected: AtomicU64,
}

impl SyncStats {
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_response(&self) {
        self.responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forward_failure(&self) {
        self.forward_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, pending: usize) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            responses: self.responses.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            forward_failures: self.forward_failures.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    /// Requests accepted into a session.
    pub requests: u64,
    /// Responses received, matched or not.
    pub responses: u64,
    /// Responses handed to a waiting request.
    pub delivered: u64,
    pub timeouts: u64,
    pub forward_failures: u64,
    /// Requests refused on admission (duplicate id, capacity or shutdown).
    pub rejected: u64,
    pub pending: usize,
}
