//! Request and domain counters for monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Server metrics.
#[derive(Default)]
pub struct Metrics {
    /// Total requests handled.
    pub requests_total: AtomicU64,
    /// Responses with a 4xx status.
    pub client_errors: AtomicU64,
    /// Responses with a 5xx status.
    pub server_errors: AtomicU64,
    /// Pairs registered explicitly.
    pub pairs_registered: AtomicU64,
    /// Pairs deleted.
    pub pairs_deleted: AtomicU64,
    /// Rates ingested, inserts and overwrites alike.
    pub rates_ingested: AtomicU64,
    /// Trend queries answered.
    pub trend_queries: AtomicU64,
    /// Daily snapshots answered.
    pub snapshots_served: AtomicU64,
}

impl Metrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished request by status code.
    pub fn request_completed(&self, status: u16) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        match status {
            400..=499 => {
                self.client_errors.fetch_add(1, Ordering::Relaxed);
            }
            500..=599 => {
                self.server_errors.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    pub fn pair_registered(&self) {
        self.pairs_registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pair_deleted(&self) {
        self.pairs_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rate_ingested(&self) {
        self.rates_ingested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn trend_queried(&self) {
        self.trend_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot_served(&self) {
        self.snapshots_served.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            client_errors: self.client_errors.load(Ordering::Relaxed),
            server_errors: self.server_errors.load(Ordering::Relaxed),
            pairs_registered: self.pairs_registered.load(Ordering::Relaxed),
            pairs_deleted: self.pairs_deleted.load(Ordering::Relaxed),
            rates_ingested: self.rates_ingested.load(Ordering::Relaxed),
            trend_queries: self.trend_queries.load(Ordering::Relaxed),
            snapshots_served: self.snapshots_served.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let series = [
            ("requests_total", "counter", "Total HTTP requests handled", snapshot.requests_total),
            ("client_errors_total", "counter", "Responses with a 4xx status", snapshot.client_errors),
            ("server_errors_total", "counter", "Responses with a 5xx status", snapshot.server_errors),
            ("pairs_registered_total", "counter", "Currency pairs registered", snapshot.pairs_registered),
            ("pairs_deleted_total", "counter", "Currency pairs deleted", snapshot.pairs_deleted),
            ("rates_ingested_total", "counter", "Daily rates ingested", snapshot.rates_ingested),
            ("trend_queries_total", "counter", "Trend queries answered", snapshot.trend_queries),
            ("snapshots_served_total", "counter", "Daily snapshots answered", snapshot.snapshots_served),
        ];

        let mut out = String::new();
        for (name, kind, help, value) in series {
            out.push_str(&format!(
                "# HELP ratewatch_{name} {help}\n# TYPE ratewatch_{name} {kind}\nratewatch_{name} {value}\n\n"
            ));
        }
        out
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub client_errors: u64,
    pub server_errors: u64,
    pub pairs_registered: u64,
    pub pairs_deleted: u64,
    pub rates_ingested: u64,
    pub trend_queries: u64,
    pub snapshots_served: u64,
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<Metrics>;
