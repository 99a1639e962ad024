//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (Decimal for token amounts)

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Account identifier (the owning user id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntryKind {
    /// Reward for a verified trip
    Earn = 1,
    /// Principal locked into a stake position
    Stake = 2,
    /// Principal returned outside a maturity settlement
    Unstake = 3,
    /// Principal plus accrued yield returned at maturity
    StakeReward = 4,
    /// Redemption against the rewards catalog
    Claim = 5,
}

impl EntryKind {
    /// Whether entries of this kind raise the balance
    pub fn is_credit(&self) -> bool {
        matches!(self, EntryKind::Earn | EntryKind::Unstake | EntryKind::StakeReward)
    }

    /// Stable code used in storage keys
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntryKind::Earn => "EARN",
            EntryKind::Stake => "STAKE",
            EntryKind::Unstake => "UNSTAKE",
            EntryKind::StakeReward => "STAKE_REWARD",
            EntryKind::Claim => "CLAIM",
        };
        f.write_str(name)
    }
}

/// Immutable ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry ID (UUIDv7 for time-ordering)
    pub entry_id: Uuid,

    /// Account this entry belongs to
    pub account_id: AccountId,

    /// Position in the account's log, gap-free from 0
    pub sequence: u64,

    /// Entry kind
    pub kind: EntryKind,

    /// Signed amount (negative for debits)
    pub amount: Decimal,

    /// Account balance after this entry was applied
    pub balance_after: Decimal,

    /// Trip, stake or claim this entry settles
    pub reference: Uuid,

    /// Posting time
    pub timestamp: DateTime<Utc>,
}

/// Cached account state, derived from the entry log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountState {
    /// Current balance
    pub balance: Decimal,

    /// Principal currently locked in stakes
    pub staked: Decimal,

    /// Sequence number the next entry must carry
    pub next_sequence: u64,

    /// Principal per open stake reference
    pub(crate) open_stakes: HashMap<Uuid, Decimal>,

    /// Set once reconciliation fails; blocks further mutation
    pub halted: Option<String>,
}

impl AccountState {
    /// Apply an entry, checking that its snapshot agrees with the running fold
    pub fn apply(&mut self, entry: &LedgerEntry) -> Result<()> {
        if entry.sequence != self.next_sequence {
            return Err(Error::InvariantViolation {
                account_id: entry.account_id.to_string(),
                detail: format!(
                    "sequence gap: expected {}, found {}",
                    self.next_sequence, entry.sequence
                ),
            });
        }

        let balance = self.balance + entry.amount;
        if balance != entry.balance_after {
            return Err(Error::InvariantViolation {
                account_id: entry.account_id.to_string(),
                detail: format!(
                    "entry {} records balance {} but log sums to {}",
                    entry.sequence, entry.balance_after, balance
                ),
            });
        }
        if balance < Decimal::ZERO {
            return Err(Error::InvariantViolation {
                account_id: entry.account_id.to_string(),
                detail: format!("balance {} below zero at entry {}", balance, entry.sequence),
            });
        }

        match entry.kind {
            EntryKind::Stake => {
                let principal = -entry.amount;
                self.open_stakes.insert(entry.reference, principal);
                self.staked += principal;
            }
            EntryKind::StakeReward | EntryKind::Unstake => {
                if let Some(principal) = self.open_stakes.remove(&entry.reference) {
                    self.staked -= principal;
                }
            }
            EntryKind::Earn | EntryKind::Claim => {}
        }

        self.balance = balance;
        self.next_sequence += 1;
        Ok(())
    }

    /// Rebuild state from a full entry log
    pub fn replay<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> Result<Self> {
        let mut state = AccountState::default();
        for entry in entries {
            state.apply(entry)?;
        }
        Ok(state)
    }

    /// Compare the monetary figures of two states
    pub fn agrees_with(&self, other: &AccountState) -> bool {
        self.balance == other.balance
            && self.staked == other.staked
            && self.next_sequence == other.next_sequence
    }
}

/// Point-in-time view of an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Account ID
    pub account_id: AccountId,
    /// Current balance
    pub balance: Decimal,
    /// Principal locked in active stakes
    pub staked: Decimal,
    /// Number of entries in the log
    pub entry_count: u64,
}

impl AccountSnapshot {
    pub(crate) fn from_state(account_id: &AccountId, state: &AccountState) -> Self {
        Self {
            account_id: account_id.clone(),
            balance: state.balance,
            staked: state.staked,
            entry_count: state.next_sequence,
        }
    }
}

/// Outcome of a credit or debit
#[derive(Debug, Clone, PartialEq)]
pub struct Posting {
    /// The entry for this (kind, reference)
    pub entry: LedgerEntry,

    /// True when the entry already existed and nothing was written
    pub replayed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(seq: u64, kind: EntryKind, amount: Decimal, after: Decimal, reference: Uuid) -> LedgerEntry {
        LedgerEntry {
            entry_id: Uuid::now_v7(),
            account_id: AccountId::new("user-1"),
            sequence: seq,
            kind,
            amount,
            balance_after: after,
            reference,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_entry_kind_direction() {
        assert!(EntryKind::Earn.is_credit());
        assert!(EntryKind::StakeReward.is_credit());
        assert!(EntryKind::Unstake.is_credit());
        assert!(!EntryKind::Stake.is_credit());
        assert!(!EntryKind::Claim.is_credit());
    }

    #[test]
    fn test_replay_tracks_staked_principal() {
        let stake = Uuid::now_v7();
        let log = vec![
            entry(0, EntryKind::Earn, dec!(150), dec!(150), Uuid::now_v7()),
            entry(1, EntryKind::Stake, dec!(-100), dec!(50), stake),
            entry(2, EntryKind::StakeReward, dec!(104.93), dec!(154.93), stake),
        ];

        let state = AccountState::replay(&log[..2]).unwrap();
        assert_eq!(state.balance, dec!(50));
        assert_eq!(state.staked, dec!(100));

        let state = AccountState::replay(&log).unwrap();
        assert_eq!(state.balance, dec!(154.93));
        assert_eq!(state.staked, Decimal::ZERO);
        assert_eq!(state.next_sequence, 3);
    }

    #[test]
    fn test_replay_rejects_wrong_snapshot() {
        let log = vec![
            entry(0, EntryKind::Earn, dec!(10), dec!(10), Uuid::now_v7()),
            entry(1, EntryKind::Earn, dec!(5), dec!(16), Uuid::now_v7()),
        ];
        let err = AccountState::replay(&log).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation { .. }));
    }

    #[test]
    fn test_replay_rejects_sequence_gap() {
        let log = vec![
            entry(0, EntryKind::Earn, dec!(10), dec!(10), Uuid::now_v7()),
            entry(2, EntryKind::Earn, dec!(5), dec!(15), Uuid::now_v7()),
        ];
        assert!(AccountState::replay(&log).is_err());
    }
}
