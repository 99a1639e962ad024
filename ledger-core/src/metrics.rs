//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `ledger_entries_total` - Entries appended
//! - `ledger_replayed_postings_total` - Postings answered from an existing entry
//! - `ledger_lock_busy_total` - Writer-right acquisitions that timed out
//! - `ledger_invariant_violations_total` - Accounts halted by reconciliation
//! - `ledger_lock_wait_seconds` - Histogram of writer-right wait times

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone, Debug)]
pub struct Metrics {
    /// Entries appended
    pub entries_total: IntCounter,

    /// Idempotent replays
    pub replayed_postings: IntCounter,

    /// Busy rejections
    pub lock_busy: IntCounter,

    /// Invariant violations
    pub invariant_violations: IntCounter,

    /// Writer-right wait histogram
    pub lock_wait: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let entries_total = IntCounter::new("ledger_entries_total", "Total number of entries appended")?;
        registry.register(Box::new(entries_total.clone()))?;

        let replayed_postings = IntCounter::new(
            "ledger_replayed_postings_total",
            "Postings answered from an existing entry",
        )?;
        registry.register(Box::new(replayed_postings.clone()))?;

        let lock_busy = IntCounter::new(
            "ledger_lock_busy_total",
            "Writer-right acquisitions that timed out",
        )?;
        registry.register(Box::new(lock_busy.clone()))?;

        let invariant_violations = IntCounter::new(
            "ledger_invariant_violations_total",
            "Accounts halted by reconciliation",
        )?;
        registry.register(Box::new(invariant_violations.clone()))?;

        let lock_wait = Histogram::with_opts(
            HistogramOpts::new("ledger_lock_wait_seconds", "Histogram of writer-right wait times")
                .buckets(vec![0.0005, 0.001, 0.005, 0.010, 0.050, 0.100, 0.500, 1.0, 3.0]),
        )?;
        registry.register(Box::new(lock_wait.clone()))?;

        Ok(Self {
            entries_total,
            replayed_postings,
            lock_busy,
            invariant_violations,
            lock_wait,
            registry,
        })
    }

    /// Record appended entries
    pub fn record_entries(&self, count: usize) {
        self.entries_total.inc_by(count as u64);
    }

    /// Record an idempotent replay
    pub fn record_replay(&self) {
        self.replayed_postings.inc();
    }

    /// Record a Busy rejection
    pub fn record_busy(&self) {
        self.lock_busy.inc();
    }

    /// Record an invariant violation
    pub fn record_invariant_violation(&self) {
        self.invariant_violations.inc();
    }

    /// Record writer-right wait
    pub fn record_lock_wait(&self, seconds: f64) {
        self.lock_wait.observe(seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
