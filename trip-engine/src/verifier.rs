//! Trip verification state machine
//!
//! PENDING → VERIFIED | REJECTED, both terminal. A verified trip is credited
//! exactly once: the EARN posting is keyed by the trip id and commits in the
//! same write as the status change.

use crate::{
    config::VerifierConfig, reward::RewardCalculator, Attestation, Error, RejectionReason, Result,
    Trip, TripStatus, TRIPS,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledger_core::{EntryKind, Ledger};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Device and location integrity signal for a pending trip
#[async_trait]
pub trait Attestor: Send + Sync + std::fmt::Debug {
    /// Attest a trip; errors leave the trip PENDING
    async fn attest(&self, trip: &Trip) -> Result<Attestation>;
}

/// Attestor returning a fixed signal
#[derive(Debug, Clone, Copy)]
pub struct StaticAttestor {
    attestation: Attestation,
}

impl StaticAttestor {
    /// Always answer with `attestation`
    pub fn new(attestation: Attestation) -> Self {
        Self { attestation }
    }

    /// Treat every trip as genuine with full confidence
    pub fn trusting() -> Self {
        Self::new(Attestation {
            genuine: true,
            confidence: 1.0,
        })
    }
}

#[async_trait]
impl Attestor for StaticAttestor {
    async fn attest(&self, _trip: &Trip) -> Result<Attestation> {
        Ok(self.attestation)
    }
}

/// Trip verifier
#[derive(Debug)]
pub struct TripVerifier {
    ledger: Arc<Ledger>,
    calculator: RewardCalculator,
    attestor: Arc<dyn Attestor>,
    config: VerifierConfig,
}

impl TripVerifier {
    /// Create verifier
    pub fn new(
        ledger: Arc<Ledger>,
        calculator: RewardCalculator,
        attestor: Arc<dyn Attestor>,
        config: VerifierConfig,
    ) -> Self {
        Self {
            ledger,
            calculator,
            attestor,
            config,
        }
    }

    fn load(&self, trip_id: Uuid) -> Result<Trip> {
        self.ledger
            .storage()
            .get_record(TRIPS, &trip_id)?
            .ok_or(Error::TripNotFound(trip_id))
    }

    fn decide(&self, trip: &Trip, attestation: Option<Attestation>) -> Option<RejectionReason> {
        let ceiling = self.config.max_submissions_per_window;
        if trip.window_rank > ceiling {
            return Some(RejectionReason::RateLimited {
                rank: trip.window_rank,
                ceiling,
            });
        }

        match attestation {
            Some(a) if !a.genuine => Some(RejectionReason::NotGenuine),
            // NaN or out-of-range signals must not pass
            Some(a) if !(a.confidence >= self.config.min_attestation_confidence && a.confidence <= 1.0) => {
                Some(RejectionReason::LowConfidence {
                    confidence: a.confidence,
                    minimum: self.config.min_attestation_confidence,
                })
            }
            Some(_) => None,
            None => Some(RejectionReason::NotGenuine),
        }
    }

    /// Verify a trip
    pub async fn verify(&self, trip_id: Uuid) -> Result<Trip> {
        self.verify_at(trip_id, Utc::now()).await
    }

    /// Verify a trip, stamping `now` as the verification time
    pub async fn verify_at(&self, trip_id: Uuid, now: DateTime<Utc>) -> Result<Trip> {
        let trip = self.load(trip_id)?;
        if trip.status.is_terminal() {
            return Ok(trip);
        }

        // The collaborator is consulted outside the writer right, and only
        // when the rate ceiling would not reject the trip anyway
        let attestation = if trip.window_rank <= self.config.max_submissions_per_window {
            Some(self.attestor.attest(&trip).await?)
        } else {
            None
        };

        let mut txn = self.ledger.begin(&trip.account_id).await?;

        let mut trip: Trip = txn
            .storage()
            .get_record(TRIPS, &trip_id)?
            .ok_or(Error::TripNotFound(trip_id))?;
        if trip.status.is_terminal() {
            return Ok(trip);
        }

        trip.verified_at = Some(now);
        match self.decide(&trip, attestation) {
            Some(reason) => {
                trip.status = TripStatus::Rejected;
                trip.rejection = Some(reason);
            }
            None => {
                let quote = self.calculator.compute(trip.mode, trip.distance_km);
                if quote.tokens > Decimal::ZERO {
                    txn.credit(EntryKind::Earn, quote.tokens, trip.id)?;
                }
                trip.status = TripStatus::Verified;
                trip.co2_saved_kg = Some(quote.co2_saved_kg);
                trip.tokens_earned = Some(quote.tokens);
            }
        }

        txn.put_record(TRIPS, &trip.id, &trip)?;
        txn.commit()?;

        match &trip.rejection {
            Some(reason) => tracing::info!(
                trip_id = %trip.id,
                account_id = %trip.account_id,
                reason = %reason,
                "Trip rejected"
            ),
            None => tracing::info!(
                trip_id = %trip.id,
                account_id = %trip.account_id,
                co2_saved_kg = ?trip.co2_saved_kg,
                tokens = ?trip.tokens_earned,
                "Trip verified"
            ),
        }
        Ok(trip)
    }
}
