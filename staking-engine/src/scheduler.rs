//! Maturity scheduler
//!
//! Periodically settles every ACTIVE position whose lock period has ended.
//! Per-position failures (for example `Busy`) are logged and retried on the
//! next tick.

use crate::{engine::StakingEngine, SweepReport};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Background maturity sweep
#[derive(Debug)]
pub struct MaturityScheduler {
    engine: Arc<StakingEngine>,
    interval: Duration,
}

impl MaturityScheduler {
    /// Create scheduler using the engine's configured interval
    pub fn new(engine: Arc<StakingEngine>) -> Self {
        let interval = Duration::from_secs(engine.config().sweep_interval_secs);
        Self { engine, interval }
    }

    /// Override the sweep interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run one sweep now
    pub async fn sweep(&self) -> Option<SweepReport> {
        match self.engine.settle_due(Utc::now()).await {
            Ok(report) => {
                if report.due > 0 {
                    info!(
                        due = report.due,
                        settled = report.settled.len(),
                        failed = report.failed.len(),
                        "Maturity sweep complete"
                    );
                } else {
                    debug!("Maturity sweep found nothing due");
                }
                Some(report)
            }
            Err(e) => {
                warn!(error = %e, "Maturity sweep failed");
                None
            }
        }
    }

    /// Start scheduler loop
    pub async fn start(self: Arc<Self>) {
        info!(interval_secs = self.interval.as_secs(), "Starting maturity scheduler");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            self.sweep().await;
        }
    }
}
