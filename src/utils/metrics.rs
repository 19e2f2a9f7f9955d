//! Observability and Metrics
//!
//! This module provides metrics collection for monitoring paging traffic and
//! session health.
//!
//! Uses atomic counters for thread-safe metrics collection. The session-side
//! fetch counter is incremented from the fault handler, which is why every
//! update here sticks to lock-free relaxed atomics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Metrics collector owned by a page server
#[derive(Debug)]
pub struct ServerMetrics {
    /// Total connections accepted
    pub connections_total: AtomicU64,
    /// Handshakes rejected with NACK
    pub handshakes_rejected: AtomicU64,
    /// Pages served to fetch requests
    pub pages_served: AtomicU64,
    /// Page syncs applied to the store
    pub syncs_accepted: AtomicU64,
    /// Page syncs rejected (out of bounds or persist failure)
    pub syncs_rejected: AtomicU64,
    /// Connections torn down on protocol violations or transport errors
    pub connection_errors: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl ServerMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            handshakes_rejected: AtomicU64::new(0),
            pages_served: AtomicU64::new(0),
            syncs_accepted: AtomicU64::new(0),
            syncs_rejected: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a new connection
    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a handshake rejected with NACK
    pub fn handshake_rejected(&self) {
        self.handshakes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a page answered to a fetch request
    pub fn page_served(&self) {
        self.pages_served.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an accepted sync
    pub fn sync_accepted(&self) {
        self.syncs_accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected sync
    pub fn sync_rejected(&self) {
        self.syncs_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection torn down on an error
    pub fn connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> ServerMetricsSnapshot {
        ServerMetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            handshakes_rejected: self.handshakes_rejected.load(Ordering::Relaxed),
            pages_served: self.pages_served.load(Ordering::Relaxed),
            syncs_accepted: self.syncs_accepted.load(Ordering::Relaxed),
            syncs_rejected: self.syncs_rejected.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            handshakes_rejected = snapshot.handshakes_rejected,
            pages_served = snapshot.pages_served,
            syncs_accepted = snapshot.syncs_accepted,
            syncs_rejected = snapshot.syncs_rejected,
            connection_errors = snapshot.connection_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Page server metrics snapshot"
        );
    }
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of server metrics at a point in time
#[derive(Debug, Clone)]
pub struct ServerMetricsSnapshot {
    pub connections_total: u64,
    pub handshakes_rejected: u64,
    pub pages_served: u64,
    pub syncs_accepted: u64,
    pub syncs_rejected: u64,
    pub connection_errors: u64,
    pub uptime_seconds: u64,
}

/// Snapshot of one session's paging activity
///
/// `pages_fetched` counts demand fetches triggered by first-touch faults; a
/// repeated access to a resident page does not move it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub pages_fetched: u64,
    pub pages_synced: u64,
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = ServerMetrics::new();
        metrics.connection_established();
        metrics.page_served();
        metrics.page_served();
        metrics.sync_accepted();
        metrics.sync_rejected();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connections_total, 1);
        assert_eq!(snapshot.pages_served, 2);
        assert_eq!(snapshot.syncs_accepted, 1);
        assert_eq!(snapshot.syncs_rejected, 1);
        assert_eq!(snapshot.connection_errors, 0);
    }
}
