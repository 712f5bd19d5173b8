//! Telemetry with atomic counters and a serializable snapshot

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters tracking pipeline throughput and failures
#[derive(Debug, Default)]
pub struct WatchMetrics {
    /// Log events received from the stream
    pub logs_received: AtomicU64,
    /// Log events carrying a transaction-level error
    pub failed_tx_events: AtomicU64,
    /// Transactions fetched successfully
    pub tx_fetched: AtomicU64,
    /// Transaction fetch failures
    pub tx_fetch_errors: AtomicU64,
    /// New mints registered
    pub mints_discovered: AtomicU64,
    /// Reports fetched and accepted
    pub reports_accepted: AtomicU64,
    /// Reports discarded as high-risk
    pub reports_discarded: AtomicU64,
    /// Report fetches that exhausted their retries
    pub report_failures: AtomicU64,
    /// Stream reconnect attempts
    pub reconnect_count: AtomicU64,
    /// Snapshot publishes dropped on a full subscriber
    pub snapshots_dropped: AtomicU64,
}

/// Point-in-time copy of the counters, for logging and inspection
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub logs_received: u64,
    pub failed_tx_events: u64,
    pub tx_fetched: u64,
    pub tx_fetch_errors: u64,
    pub mints_discovered: u64,
    pub reports_accepted: u64,
    pub reports_discarded: u64,
    pub report_failures: u64,
    pub reconnect_count: u64,
    pub snapshots_dropped: u64,
}

impl WatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Export a consistent-enough snapshot (relaxed loads; counters only)
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            logs_received: self.logs_received.load(Ordering::Relaxed),
            failed_tx_events: self.failed_tx_events.load(Ordering::Relaxed),
            tx_fetched: self.tx_fetched.load(Ordering::Relaxed),
            tx_fetch_errors: self.tx_fetch_errors.load(Ordering::Relaxed),
            mints_discovered: self.mints_discovered.load(Ordering::Relaxed),
            reports_accepted: self.reports_accepted.load(Ordering::Relaxed),
            reports_discarded: self.reports_discarded.load(Ordering::Relaxed),
            report_failures: self.report_failures.load(Ordering::Relaxed),
            reconnect_count: self.reconnect_count.load(Ordering::Relaxed),
            snapshots_dropped: self.snapshots_dropped.load(Ordering::Relaxed),
        }
    }
}
