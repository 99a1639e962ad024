//! Main staking engine
//!
//! Every position mutation runs inside the owner's account transaction, so
//! stake creation and settlement serialize with trip credits and claims.

use crate::config::{apy_for, Config, TIERS};
use crate::{Error, Result, StakePosition, StakeStatus, STAKES};
use chrono::{DateTime, Utc};
use ledger_core::{account_index_key, account_index_prefix, AccountId, EntryKind, Ledger};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

const ACCOUNT_STAKES_INDEX: &[u8] = b"account-stakes/";

/// principal × apy × days / 365, rounded to 0.01 half-to-even
pub fn accrued_reward(principal: Decimal, apy_bps: u32, duration_days: u32) -> Decimal {
    let numerator = principal * Decimal::from(apy_bps) * Decimal::from(duration_days);
    let denominator = Decimal::from(10_000u32 * 365);
    (numerator / denominator).round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// Outcome of a maturity sweep
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepReport {
    /// Positions found due
    pub due: usize,
    /// Positions settled by this sweep
    pub settled: Vec<Uuid>,
    /// Positions that could not be settled, with the reason
    pub failed: Vec<(Uuid, String)>,
}

/// Staking engine
#[derive(Debug)]
pub struct StakingEngine {
    /// Ledger core
    ledger: Arc<Ledger>,

    /// Configuration
    config: Config,
}

impl StakingEngine {
    /// Create new staking engine
    pub fn new(ledger: Arc<Ledger>, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { ledger, config })
    }

    /// Lock `amount` for `duration_days`
    pub async fn create_stake(
        &self,
        account_id: &AccountId,
        amount: Decimal,
        duration_days: u32,
    ) -> Result<StakePosition> {
        self.create_stake_at(account_id, amount, duration_days, Utc::now()).await
    }

    /// Lock `amount` for `duration_days`, starting at `now`
    pub async fn create_stake_at(
        &self,
        account_id: &AccountId,
        amount: Decimal,
        duration_days: u32,
        now: DateTime<Utc>,
    ) -> Result<StakePosition> {
        if amount <= Decimal::ZERO {
            return Err(Error::Validation(format!("stake amount must be positive, got {}", amount)));
        }
        let apy_bps = apy_for(duration_days).ok_or_else(|| {
            Error::Validation(format!(
                "{} days is not a staking tier (allowed: {:?})",
                duration_days,
                TIERS.iter().map(|t| t.days).collect::<Vec<_>>()
            ))
        })?;

        let position = StakePosition {
            id: Uuid::now_v7(),
            account_id: account_id.clone(),
            principal: amount,
            start_date: now,
            duration_days,
            apy_bps,
            status: StakeStatus::Active,
            accrued_reward: None,
            matured_at: None,
            withdrawn_at: None,
        };

        let mut txn = self.ledger.begin(account_id).await?;
        txn.debit(EntryKind::Stake, amount, position.id)?;
        txn.put_record(STAKES, &position.id, &position)?;
        txn.put_index(
            account_index_key(ACCOUNT_STAKES_INDEX, account_id, &position.id),
            position.id.as_bytes().to_vec(),
        );
        txn.commit()?;

        tracing::info!(
            stake_id = %position.id,
            account_id = %account_id,
            principal = %amount,
            duration_days,
            apy_bps,
            "Stake created"
        );
        Ok(position)
    }

    /// Credit principal plus reward once the lock period has ended
    pub async fn settle(&self, stake_id: Uuid) -> Result<StakePosition> {
        self.settle_at(stake_id, Utc::now()).await
    }

    /// Settle as of `now`
    pub async fn settle_at(&self, stake_id: Uuid, now: DateTime<Utc>) -> Result<StakePosition> {
        let account_id = self.get(stake_id)?.account_id;

        let mut txn = self.ledger.begin(&account_id).await?;
        let mut position: StakePosition = txn
            .storage()
            .get_record(STAKES, &stake_id)?
            .ok_or(Error::StakeNotFound(stake_id))?;

        if position.status != StakeStatus::Active {
            return Ok(position);
        }
        if !position.is_due(now) {
            return Err(Error::NotMatured {
                stake_id,
                matures_at: position.end_date(),
            });
        }

        let reward = accrued_reward(position.principal, position.apy_bps, position.duration_days);
        txn.credit(EntryKind::StakeReward, position.principal + reward, stake_id)?;

        position.status = StakeStatus::Matured;
        position.accrued_reward = Some(reward);
        position.matured_at = Some(now);
        txn.put_record(STAKES, &position.id, &position)?;
        txn.commit()?;

        tracing::info!(
            stake_id = %stake_id,
            account_id = %account_id,
            principal = %position.principal,
            reward = %reward,
            "Stake matured"
        );
        Ok(position)
    }

    /// Mark a matured position as withdrawn
    pub async fn withdraw(&self, stake_id: Uuid) -> Result<StakePosition> {
        self.withdraw_at(stake_id, Utc::now()).await
    }

    /// Withdraw as of `now`
    pub async fn withdraw_at(&self, stake_id: Uuid, now: DateTime<Utc>) -> Result<StakePosition> {
        let account_id = self.get(stake_id)?.account_id;

        let mut txn = self.ledger.begin(&account_id).await?;
        let mut position: StakePosition = txn
            .storage()
            .get_record(STAKES, &stake_id)?
            .ok_or(Error::StakeNotFound(stake_id))?;

        match position.status {
            StakeStatus::Withdrawn => return Ok(position),
            StakeStatus::Active => {
                return Err(Error::NotMatured {
                    stake_id,
                    matures_at: position.end_date(),
                })
            }
            StakeStatus::Matured => {}
        }

        if txn.find_posting(EntryKind::StakeReward, &stake_id)?.is_none() {
            return Err(Error::InvalidState(format!(
                "stake {} is MATURED but its STAKE_REWARD entry is missing",
                stake_id
            )));
        }

        position.status = StakeStatus::Withdrawn;
        position.withdrawn_at = Some(now);
        txn.put_record(STAKES, &position.id, &position)?;
        txn.commit()?;

        tracing::info!(stake_id = %stake_id, account_id = %account_id, "Stake withdrawn");
        Ok(position)
    }

    /// Look up a position
    pub fn get(&self, stake_id: Uuid) -> Result<StakePosition> {
        self.ledger
            .storage()
            .get_record(STAKES, &stake_id)?
            .ok_or(Error::StakeNotFound(stake_id))
    }

    /// Positions owned by an account, oldest first
    pub fn list_for_account(&self, account_id: &AccountId) -> Result<Vec<StakePosition>> {
        self.ledger
            .storage()
            .scan_index_ids(&account_index_prefix(ACCOUNT_STAKES_INDEX, account_id))?
            .into_iter()
            .map(|stake_id| self.get(stake_id))
            .collect()
    }

    /// ACTIVE positions whose lock period has ended at `now`
    pub fn due_positions(&self, now: DateTime<Utc>) -> Result<Vec<StakePosition>> {
        let positions: Vec<StakePosition> = self.ledger.storage().scan_records(STAKES)?;
        Ok(positions
            .into_iter()
            .filter(|p| p.status == StakeStatus::Active && p.is_due(now))
            .collect())
    }

    /// Settle every due position, skipping those that fail
    pub async fn settle_due(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let due = self.due_positions(now)?;
        let mut report = SweepReport {
            due: due.len(),
            ..SweepReport::default()
        };

        for position in due {
            match self.settle_at(position.id, now).await {
                Ok(_) => report.settled.push(position.id),
                Err(e) => {
                    tracing::warn!(
                        stake_id = %position.id,
                        account_id = %position.account_id,
                        error = %e,
                        "Stake settlement skipped"
                    );
                    report.failed.push((position.id, e.to_string()));
                }
            }
        }
        Ok(report)
    }

    /// Staking configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    async fn create_engine(funds: Decimal) -> (StakingEngine, Arc<Ledger>, AccountId, TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = ledger_core::Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..ledger_core::Config::default()
        };
        let ledger = Arc::new(Ledger::open(config).unwrap());
        let alice = AccountId::new("alice");
        if funds > Decimal::ZERO {
            ledger.credit(&alice, EntryKind::Earn, funds, Uuid::now_v7()).await.unwrap();
        }
        let engine = StakingEngine::new(ledger.clone(), Config::default()).unwrap();
        (engine, ledger, alice, temp_dir)
    }

    #[test]
    fn test_accrued_reward() {
        assert_eq!(accrued_reward(dec!(100), 1_000, 180), dec!(4.93));
        assert_eq!(accrued_reward(dec!(100), 1_500, 365), dec!(15));
        assert_eq!(accrued_reward(dec!(1000), 500, 30), dec!(4.11));
    }

    #[tokio::test]
    async fn test_stake_matures_with_reward() {
        let (engine, ledger, alice, _temp) = create_engine(dec!(150)).await;
        let start = Utc::now() - Duration::days(200);

        let stake = engine.create_stake_at(&alice, dec!(100), 180, start).await.unwrap();
        assert_eq!(stake.status, StakeStatus::Active);
        assert_eq!(stake.apy_bps, 1_000);

        let snapshot = ledger.snapshot(&alice).await.unwrap();
        assert_eq!(snapshot.balance, dec!(50));
        assert_eq!(snapshot.staked, dec!(100));

        let matured = engine.settle(stake.id).await.unwrap();
        assert_eq!(matured.status, StakeStatus::Matured);
        assert_eq!(matured.accrued_reward, Some(dec!(4.93)));

        let snapshot = ledger.reconcile(&alice).await.unwrap();
        assert_eq!(snapshot.balance, dec!(154.93));
        assert_eq!(snapshot.staked, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_settle_before_end_is_not_matured() {
        let (engine, ledger, alice, _temp) = create_engine(dec!(100)).await;

        let stake = engine.create_stake(&alice, dec!(100), 30).await.unwrap();
        let err = engine.settle(stake.id).await.unwrap_err();
        assert!(matches!(err, Error::NotMatured { .. }));

        let err = engine.withdraw(stake.id).await.unwrap_err();
        assert_eq!(err.kind(), ledger_core::ErrorKind::NotMatured);

        assert_eq!(ledger.snapshot(&alice).await.unwrap().balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_settle_twice_credits_once() {
        let (engine, ledger, alice, _temp) = create_engine(dec!(100)).await;
        let start = Utc::now() - Duration::days(31);

        let stake = engine.create_stake_at(&alice, dec!(100), 30, start).await.unwrap();
        let first = engine.settle(stake.id).await.unwrap();
        let second = engine.settle(stake.id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(ledger.entries(&alice).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_withdraw_after_maturity() {
        let (engine, _ledger, alice, _temp) = create_engine(dec!(100)).await;
        let start = Utc::now() - Duration::days(91);

        let stake = engine.create_stake_at(&alice, dec!(100), 90, start).await.unwrap();
        engine.settle(stake.id).await.unwrap();

        let withdrawn = engine.withdraw(stake.id).await.unwrap();
        assert_eq!(withdrawn.status, StakeStatus::Withdrawn);
        assert!(withdrawn.withdrawn_at.is_some());

        let again = engine.withdraw(stake.id).await.unwrap();
        assert_eq!(again, withdrawn);

        // Settling a withdrawn position leaves it unchanged
        assert_eq!(engine.settle(stake.id).await.unwrap(), withdrawn);
    }

    #[tokio::test]
    async fn test_stake_requires_funds_and_tier() {
        let (engine, ledger, alice, _temp) = create_engine(dec!(40)).await;

        let err = engine.create_stake(&alice, dec!(50), 30).await.unwrap_err();
        assert_eq!(err.kind(), ledger_core::ErrorKind::InsufficientBalance);

        let err = engine.create_stake(&alice, dec!(10), 45).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = engine.create_stake(&alice, Decimal::ZERO, 30).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        assert_eq!(ledger.snapshot(&alice).await.unwrap().balance, dec!(40));
        assert!(engine.list_for_account(&alice).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_settle_due_sweeps_only_due_positions() {
        let (engine, ledger, alice, _temp) = create_engine(dec!(300)).await;
        let now = Utc::now();

        let due = engine
            .create_stake_at(&alice, dec!(100), 30, now - Duration::days(40))
            .await
            .unwrap();
        let locked = engine.create_stake_at(&alice, dec!(100), 365, now).await.unwrap();

        let report = engine.settle_due(now).await.unwrap();
        assert_eq!(report.due, 1);
        assert_eq!(report.settled, vec![due.id]);
        assert!(report.failed.is_empty());

        assert_eq!(engine.get(locked.id).unwrap().status, StakeStatus::Active);
        assert_eq!(engine.list_for_account(&alice).unwrap().len(), 2);
        assert_eq!(ledger.snapshot(&alice).await.unwrap().staked, dec!(100));
    }

    #[tokio::test]
    async fn test_unknown_stake() {
        let (engine, _ledger, _alice, _temp) = create_engine(Decimal::ZERO).await;
        let err = engine.settle(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, Error::StakeNotFound(_)));
    }
}
