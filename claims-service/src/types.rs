use chrono::{DateTime, Utc};
use ledger_core::{AccountId, Collection};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Record collection holding claims
pub const CLAIMS: Collection = Collection::new("claims");

/// Catalog view of a redeemable reward
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub reward_id: String,
    pub name: String,
    pub cost: Decimal,
    /// Cleared by the catalog admin to withdraw the reward
    pub active: bool,
    /// Units left; `None` means unlimited
    pub remaining: Option<u32>,
}

impl CatalogEntry {
    pub fn is_available(&self) -> bool {
        self.active && self.remaining != Some(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    Pending,
    Delivered,
    Expired,
}

/// Verdict reported by the fulfillment collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fulfillment {
    Delivered { code: String },
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRecord {
    /// Claim ID (reference of the CLAIM entry)
    pub id: Uuid,
    pub account_id: AccountId,
    pub reward_id: String,
    pub cost: Decimal,
    pub claimed_at: DateTime<Utc>,
    pub status: ClaimStatus,
    pub fulfillment_code: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
}
