//! Out-of-band alerting for invariant violations
//!
//! Only a balance/log mismatch is alert-worthy; every other error is returned
//! to the caller and nothing more.

use crate::{AccountId, Metrics};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reconciliation failure report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantAlert {
    /// Halted account
    pub account_id: AccountId,
    /// What disagreed
    pub detail: String,
    /// When the mismatch was detected
    pub detected_at: DateTime<Utc>,
}

/// Receiver for operational alerts
pub trait AlertSink: Send + Sync + std::fmt::Debug {
    /// Raise an alert; must not block
    fn raise(&self, alert: &InvariantAlert);
}

/// Default sink: error-level log line plus a Prometheus counter
#[derive(Debug, Clone)]
pub struct TracingAlertSink {
    metrics: Metrics,
}

impl TracingAlertSink {
    /// Create sink reporting into `metrics`
    pub fn new(metrics: Metrics) -> Self {
        Self { metrics }
    }
}

impl AlertSink for TracingAlertSink {
    fn raise(&self, alert: &InvariantAlert) {
        self.metrics.record_invariant_violation();
        tracing::error!(
            alert = true,
            account_id = %alert.account_id,
            detected_at = %alert.detected_at,
            detail = %alert.detail,
            "Ledger invariant violated; account halted"
        );
    }
}
