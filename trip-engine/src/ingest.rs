//! Trip ingestion
//!
//! Authenticates the device, checks plausibility, deduplicates and stores a
//! PENDING trip. Deduplication runs under the owner's writer right so two
//! racing copies of one payload cannot both be accepted.

use crate::{
    config::IngestConfig, velocity::SubmissionVelocity, Device, DeviceRegistry, Error, Result,
    Trip, TripStatus, TripSubmission, DEVICES, TRIPS,
};
use chrono::{DateTime, Utc};
use ledger_core::{account_index_key, account_index_prefix, AccountId, Ledger};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

const TRIP_KEY_INDEX: &[u8] = b"trip-key/";
const ACCOUNT_TRIPS_INDEX: &[u8] = b"account-trips/";

/// Hex SHA-256 over (device, start, end)
pub fn idempotency_key(device_id: Uuid, started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(device_id.as_bytes());
    hasher.update(started_at.timestamp_micros().to_be_bytes());
    hasher.update(ended_at.timestamp_micros().to_be_bytes());
    hex::encode(hasher.finalize())
}

fn trip_key_index(key: &str) -> Vec<u8> {
    let mut index = TRIP_KEY_INDEX.to_vec();
    index.extend_from_slice(key.as_bytes());
    index
}

/// Check a submission against the plausibility bands
pub fn validate_submission(config: &IngestConfig, submission: &TripSubmission) -> Result<()> {
    if submission.distance_km <= Decimal::ZERO {
        return Err(Error::Validation(format!(
            "distance must be positive, got {} km",
            submission.distance_km
        )));
    }
    if submission.duration_minutes == 0 {
        return Err(Error::Validation("duration must be positive".to_string()));
    }
    if submission.ended_at <= submission.started_at {
        return Err(Error::Validation(format!(
            "trip ends at {} but starts at {}",
            submission.ended_at, submission.started_at
        )));
    }

    let span_secs = (submission.ended_at - submission.started_at).num_seconds();
    let claimed_secs = i64::from(submission.duration_minutes) * 60;
    let tolerance_secs = i64::from(config.duration_tolerance_minutes) * 60;
    if (span_secs - claimed_secs).abs() > tolerance_secs {
        return Err(Error::Validation(format!(
            "duration of {} minutes does not match the {} s between start and end",
            submission.duration_minutes, span_secs
        )));
    }

    let speed_kmh = submission
        .distance_km
        .checked_mul(Decimal::from(60))
        .and_then(|d| d.checked_div(Decimal::from(submission.duration_minutes)))
        .ok_or_else(|| Error::Validation(format!("distance {} km is out of range", submission.distance_km)))?;
    let ceiling = config.max_speed(submission.mode);
    if speed_kmh > ceiling {
        return Err(Error::Validation(format!(
            "{} at {} km/h exceeds the {} km/h plausibility band",
            submission.mode,
            speed_kmh.round_dp(1),
            ceiling
        )));
    }
    Ok(())
}

/// Trip ingestor
#[derive(Debug)]
pub struct TripIngestor {
    ledger: Arc<Ledger>,
    devices: Arc<DeviceRegistry>,
    velocity: Arc<SubmissionVelocity>,
    config: IngestConfig,
}

impl TripIngestor {
    /// Create ingestor
    pub fn new(
        ledger: Arc<Ledger>,
        devices: Arc<DeviceRegistry>,
        velocity: Arc<SubmissionVelocity>,
        config: IngestConfig,
    ) -> Self {
        Self {
            ledger,
            devices,
            velocity,
            config,
        }
    }

    /// Seed the velocity tracker from stored trips
    pub fn restore(&self) -> Result<usize> {
        let trips: Vec<Trip> = self.ledger.storage().scan_records(TRIPS)?;
        self.velocity.seed(&trips);
        Ok(trips.len())
    }

    /// Accept a submission as a PENDING trip
    pub async fn ingest(&self, submission: TripSubmission) -> Result<Trip> {
        self.ingest_at(submission, Utc::now()).await
    }

    /// Accept a submission received at `now`
    pub async fn ingest_at(&self, submission: TripSubmission, now: DateTime<Utc>) -> Result<Trip> {
        // Identity and plausibility before taking the writer right
        let device = self.devices.authenticate(submission.device_id)?;
        validate_submission(&self.config, &submission)?;

        let key = idempotency_key(submission.device_id, submission.started_at, submission.ended_at);

        let mut txn = self.ledger.begin(&device.owner).await?;

        if let Some(existing) = txn.storage().get_index(&trip_key_index(&key))? {
            let trip_id = Uuid::from_slice(&existing)
                .map_err(|e| ledger_core::Error::Storage(format!("corrupt trip index: {}", e)))?;
            tracing::info!(
                device_id = %device.id,
                trip_id = %trip_id,
                "Duplicate submission ignored"
            );
            return Err(Error::DuplicateSubmission { trip_id });
        }

        // Re-read under the writer right; the device may have been deactivated
        let mut device: Device = txn
            .storage()
            .get_record(DEVICES, &device.id)?
            .ok_or(Error::DeviceNotFound(device.id))?;
        if !device.active {
            return Err(Error::DeviceInactive(device.id));
        }

        let trip = Trip {
            id: Uuid::now_v7(),
            account_id: device.owner.clone(),
            device_id: device.id,
            start_location: submission.start_location,
            end_location: submission.end_location,
            distance_km: submission.distance_km,
            mode: submission.mode,
            duration_minutes: submission.duration_minutes,
            started_at: submission.started_at,
            ended_at: submission.ended_at,
            submitted_at: now,
            idempotency_key: key,
            window_rank: self.velocity.next_rank(device.id, now),
            status: TripStatus::Pending,
            co2_saved_kg: None,
            tokens_earned: None,
            verified_at: None,
            rejection: None,
        };

        device.last_active_at = now;

        txn.put_record(TRIPS, &trip.id, &trip)?;
        txn.put_record(DEVICES, &device.id, &device)?;
        txn.put_index(trip_key_index(&trip.idempotency_key), trip.id.as_bytes().to_vec());
        txn.put_index(
            account_index_key(ACCOUNT_TRIPS_INDEX, &trip.account_id, &trip.id),
            trip.id.as_bytes().to_vec(),
        );

        // Recorded while the writer right is still held, so the next
        // submission for this owner ranks after this one
        self.velocity.record(device.id, trip.id, now);
        if let Err(e) = txn.commit() {
            self.velocity.forget(device.id, trip.id);
            return Err(e.into());
        }

        tracing::info!(
            trip_id = %trip.id,
            device_id = %trip.device_id,
            account_id = %trip.account_id,
            mode = %trip.mode,
            distance_km = %trip.distance_km,
            window_rank = trip.window_rank,
            "Trip accepted"
        );
        Ok(trip)
    }

    /// Look up a trip
    pub fn get(&self, trip_id: Uuid) -> Result<Trip> {
        self.ledger
            .storage()
            .get_record(TRIPS, &trip_id)?
            .ok_or(Error::TripNotFound(trip_id))
    }

    /// Trips owned by an account, oldest first
    pub fn list_for_account(&self, account_id: &AccountId) -> Result<Vec<Trip>> {
        self.ledger
            .storage()
            .scan_index_ids(&account_index_prefix(ACCOUNT_TRIPS_INDEX, account_id))?
            .into_iter()
            .map(|trip_id| self.get(trip_id))
            .collect()
    }
}
