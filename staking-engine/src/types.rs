//! Core types for staking

use chrono::{DateTime, Duration, Utc};
use ledger_core::{AccountId, Collection};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Record collection holding stake positions
pub const STAKES: Collection = Collection::new("stakes");

/// Position lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StakeStatus {
    /// Principal locked
    Active,
    /// Principal plus reward credited
    Matured,
    /// Released to the holder (terminal)
    Withdrawn,
}

/// Staking position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakePosition {
    /// Stake ID (reference of its STAKE and STAKE_REWARD entries)
    pub id: Uuid,

    /// Owning account
    pub account_id: AccountId,

    /// Locked principal
    pub principal: Decimal,

    /// Lock start
    pub start_date: DateTime<Utc>,

    /// Lock length in days
    pub duration_days: u32,

    /// APY in basis points, fixed by the duration tier
    pub apy_bps: u32,

    /// Lifecycle status
    pub status: StakeStatus,

    /// Reward computed at maturity
    pub accrued_reward: Option<Decimal>,

    /// When the position was settled
    pub matured_at: Option<DateTime<Utc>>,

    /// When the position was withdrawn
    pub withdrawn_at: Option<DateTime<Utc>>,
}

impl StakePosition {
    /// End of the lock period
    pub fn end_date(&self) -> DateTime<Utc> {
        self.start_date + Duration::days(self.duration_days as i64)
    }

    /// Whether the lock period has ended at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_date()
    }
}
