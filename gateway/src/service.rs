//! Rewards facade
//!
//! One entry point per boundary operation. Every call returns a typed result
//! or a [`GatewayError`] whose [`kind`](GatewayError::kind) is the caller
//! contract.

use crate::config::Config;
use crate::error::Result;
use claims_service::{ClaimProcessor, ClaimRecord, Fulfillment, RewardCatalog};
use ledger_core::{AccountId, AccountSnapshot, Ledger, LedgerEntry, ReconciliationReport};
use rust_decimal::Decimal;
use staking_engine::{MaturityScheduler, StakePosition, StakingEngine};
use std::sync::Arc;
use tracing::{info, warn};
use trip_engine::{
    Attestor, Device, DeviceRegistry, NewDevice, RewardCalculator, SubmissionVelocity, Trip,
    TripIngestor, TripStatus, TripSubmission, TripVerifier, TRIPS,
};
use uuid::Uuid;

/// Green Miles rewards service
#[derive(Debug)]
pub struct RewardsService {
    ledger: Arc<Ledger>,
    devices: Arc<DeviceRegistry>,
    ingestor: TripIngestor,
    verifier: TripVerifier,
    staking: Arc<StakingEngine>,
    claims: ClaimProcessor,
}

impl RewardsService {
    /// Open storage and wire every component
    pub fn open(config: &Config, attestor: Arc<dyn Attestor>, catalog: Arc<dyn RewardCatalog>) -> Result<Self> {
        config.validate()?;
        let ledger = Arc::new(Ledger::open(config.ledger.clone())?);
        Self::with_ledger(ledger, config, attestor, catalog)
    }

    /// Wire components around an already open ledger
    pub fn with_ledger(
        ledger: Arc<Ledger>,
        config: &Config,
        attestor: Arc<dyn Attestor>,
        catalog: Arc<dyn RewardCatalog>,
    ) -> Result<Self> {
        let trips = config.trips();

        let devices = Arc::new(DeviceRegistry::new(ledger.clone()));
        let velocity = Arc::new(SubmissionVelocity::new(trips.verifier.rate_window()));
        let ingestor = TripIngestor::new(ledger.clone(), devices.clone(), velocity, trips.ingest);
        let restored = ingestor.restore()?;

        let calculator = RewardCalculator::new(trips.rewards)?;
        let verifier = TripVerifier::new(ledger.clone(), calculator, attestor, trips.verifier);
        let staking = Arc::new(StakingEngine::new(ledger.clone(), config.staking.clone())?);
        let claims = ClaimProcessor::new(ledger.clone(), catalog);

        info!(
            accounts = ledger.accounts().len(),
            trips = restored,
            "Rewards service ready"
        );

        Ok(Self {
            ledger,
            devices,
            ingestor,
            verifier,
            staking,
            claims,
        })
    }

    // ===== Devices =====

    pub async fn register_device(&self, request: NewDevice) -> Result<Device> {
        Ok(self.devices.register(request).await?)
    }

    pub async fn deactivate_device(&self, device_id: Uuid) -> Result<Device> {
        Ok(self.devices.deactivate(device_id).await?)
    }

    pub fn devices(&self, account_id: &AccountId) -> Result<Vec<Device>> {
        Ok(self.devices.list_for_account(account_id)?)
    }

    // ===== Trips =====

    /// Ingest a submission and verify it
    ///
    /// A repeat of an earlier submission fails with `DuplicateSubmission`.
    /// If verification cannot finish (attestor down, account busy) the trip
    /// is returned PENDING and is picked up again by
    /// [`resume_pending`](Self::resume_pending).
    pub async fn submit_trip(&self, submission: TripSubmission) -> Result<Trip> {
        let trip = self.ingestor.ingest(submission).await?;
        match self.verifier.verify(trip.id).await {
            Ok(verified) => Ok(verified),
            Err(e) => {
                warn!(trip_id = %trip.id, error = %e, "Verification deferred");
                Ok(trip)
            }
        }
    }

    /// Retry verification of one trip
    pub async fn verify_trip(&self, trip_id: Uuid) -> Result<Trip> {
        Ok(self.verifier.verify(trip_id).await?)
    }

    /// Verify every PENDING trip; returns how many reached a terminal state
    pub async fn resume_pending(&self) -> Result<usize> {
        let pending: Vec<Trip> = self
            .ledger
            .storage()
            .scan_records::<Trip>(TRIPS)?
            .into_iter()
            .filter(|trip| trip.status == TripStatus::Pending)
            .collect();

        let mut resolved = 0;
        for trip in &pending {
            match self.verifier.verify(trip.id).await {
                Ok(t) if t.status.is_terminal() => resolved += 1,
                Ok(_) => {}
                Err(e) => warn!(trip_id = %trip.id, error = %e, "Pending trip still unverified"),
            }
        }

        if !pending.is_empty() {
            info!(pending = pending.len(), resolved, "Pending trips resumed");
        }
        Ok(resolved)
    }

    pub fn trip(&self, trip_id: Uuid) -> Result<Trip> {
        Ok(self.ingestor.get(trip_id)?)
    }

    pub fn trips(&self, account_id: &AccountId) -> Result<Vec<Trip>> {
        Ok(self.ingestor.list_for_account(account_id)?)
    }

    // ===== Staking =====

    pub async fn create_stake(&self, account_id: &AccountId, amount: Decimal, duration_days: u32) -> Result<StakePosition> {
        Ok(self.staking.create_stake(account_id, amount, duration_days).await?)
    }

    pub async fn settle_stake(&self, stake_id: Uuid) -> Result<StakePosition> {
        Ok(self.staking.settle(stake_id).await?)
    }

    pub async fn withdraw_stake(&self, stake_id: Uuid) -> Result<StakePosition> {
        Ok(self.staking.withdraw(stake_id).await?)
    }

    pub fn stakes(&self, account_id: &AccountId) -> Result<Vec<StakePosition>> {
        Ok(self.staking.list_for_account(account_id)?)
    }

    /// Background sweep over this service's staking engine
    pub fn maturity_scheduler(&self) -> MaturityScheduler {
        MaturityScheduler::new(self.staking.clone())
    }

    // ===== Claims =====

    pub async fn claim_reward(&self, account_id: &AccountId, reward_id: &str) -> Result<ClaimRecord> {
        Ok(self.claims.claim(account_id, reward_id).await?)
    }

    /// Claim under a caller-chosen id, safe to retry
    pub async fn claim_reward_with_id(
        &self,
        account_id: &AccountId,
        reward_id: &str,
        claim_id: Uuid,
    ) -> Result<ClaimRecord> {
        Ok(self.claims.claim_with_id(account_id, reward_id, claim_id).await?)
    }

    pub async fn apply_fulfillment(&self, claim_id: Uuid, outcome: Fulfillment) -> Result<ClaimRecord> {
        Ok(self.claims.apply_fulfillment(claim_id, outcome).await?)
    }

    pub fn claims(&self, account_id: &AccountId) -> Result<Vec<ClaimRecord>> {
        Ok(self.claims.list_for_account(account_id)?)
    }

    // ===== Ledger =====

    pub async fn balance(&self, account_id: &AccountId) -> Result<AccountSnapshot> {
        Ok(self.ledger.snapshot(account_id).await?)
    }

    pub fn entries(&self, account_id: &AccountId) -> Result<Vec<LedgerEntry>> {
        Ok(self.ledger.entries(account_id)?)
    }

    pub async fn reconcile(&self, account_id: &AccountId) -> Result<AccountSnapshot> {
        Ok(self.ledger.reconcile(account_id).await?)
    }

    pub async fn reconcile_all(&self) -> ReconciliationReport {
        self.ledger.reconcile_all().await
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }
}
