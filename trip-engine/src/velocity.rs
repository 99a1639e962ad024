//! Per-device submission velocity
//!
//! Tracks accepted submissions per device over a rolling window. The
//! ingestor stamps each trip with its rank in the window; the verifier
//! compares that rank with the configured ceiling.

use crate::Trip;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct SubmissionRecord {
    trip_id: Uuid,
    submitted_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct DeviceVelocity {
    submissions: Vec<SubmissionRecord>,
}

impl DeviceVelocity {
    /// Drop submissions outside the window
    fn cleanup(&mut self, window_start: DateTime<Utc>) {
        self.submissions.retain(|s| s.submitted_at > window_start);
    }

    fn count(&self) -> usize {
        self.submissions.len()
    }
}

/// Rolling submission counter keyed by device
#[derive(Debug)]
pub struct SubmissionVelocity {
    window: Duration,
    devices: DashMap<Uuid, DeviceVelocity>,
}

impl SubmissionVelocity {
    /// Create tracker with the given window
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            devices: DashMap::new(),
        }
    }

    /// Rebuild from stored trips
    pub fn seed<'a>(&self, trips: impl IntoIterator<Item = &'a Trip>) {
        let mut seeded = 0usize;
        for trip in trips {
            self.record(trip.device_id, trip.id, trip.submitted_at);
            seeded += 1;
        }
        tracing::debug!(trips = seeded, devices = self.devices.len(), "Submission velocity seeded");
    }

    /// Rank the next submission from `device_id` would get at `at` (1-based)
    pub fn next_rank(&self, device_id: Uuid, at: DateTime<Utc>) -> u32 {
        let window_start = at - self.window;
        match self.devices.get_mut(&device_id) {
            Some(mut entry) => {
                let device = entry.value_mut();
                device.cleanup(window_start);
                device.count() as u32 + 1
            }
            None => 1,
        }
    }

    /// Record an accepted submission
    pub fn record(&self, device_id: Uuid, trip_id: Uuid, at: DateTime<Utc>) {
        let mut entry = self.devices.entry(device_id).or_default();
        entry.value_mut().submissions.push(SubmissionRecord {
            trip_id,
            submitted_at: at,
        });
    }

    /// Remove a recorded submission that was never stored
    pub fn forget(&self, device_id: Uuid, trip_id: Uuid) {
        if let Some(mut entry) = self.devices.get_mut(&device_id) {
            entry.value_mut().submissions.retain(|s| s.trip_id != trip_id);
        }
    }

    /// Current window statistics for a device
    pub fn stats(&self, device_id: Uuid, now: DateTime<Utc>) -> Option<VelocityStats> {
        let window_start = now - self.window;
        self.devices.get_mut(&device_id).map(|mut entry| {
            let device = entry.value_mut();
            device.cleanup(window_start);
            VelocityStats {
                device_id,
                submissions: device.count() as u32,
                latest_trip: device.submissions.last().map(|s| s.trip_id),
                window_start,
                window_end: now,
            }
        })
    }

    /// Number of tracked devices
    pub fn tracked_devices(&self) -> usize {
        self.devices.len()
    }
}

/// Velocity statistics for a device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VelocityStats {
    /// Device
    pub device_id: Uuid,
    /// Submissions inside the window
    pub submissions: u32,
    /// Most recent trip recorded
    pub latest_trip: Option<Uuid>,
    /// Window start (exclusive)
    pub window_start: DateTime<Utc>,
    /// Window end
    pub window_end: DateTime<Utc>,
}
