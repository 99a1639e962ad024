//! Main ledger orchestration layer
//!
//! Ties storage, the per-account lock arena and alerting together into the
//! credit/debit/reconcile API.
//!
//! # Example
//!
//! ```no_run
//! use ledger_core::{AccountId, Config, EntryKind, Ledger};
//! use rust_decimal::Decimal;
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> ledger_core::Result<()> {
//!     let ledger = Ledger::open(Config::default())?;
//!     let alice = AccountId::new("alice");
//!
//!     let trip_id = Uuid::now_v7();
//!     ledger.credit(&alice, EntryKind::Earn, Decimal::new(640, 2), trip_id).await?;
//!
//!     let snapshot = ledger.reconcile(&alice).await?;
//!     assert_eq!(snapshot.balance, Decimal::new(640, 2));
//!     Ok(())
//! }
//! ```

use crate::{
    alert::{AlertSink, InvariantAlert, TracingAlertSink},
    locks::{AccountGuard, AccountLocks},
    storage::{Collection, WriteSet},
    types::{AccountSnapshot, AccountState, EntryKind, LedgerEntry, Posting},
    AccountId, Config, Error, Metrics, Result, Storage,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Main ledger interface
#[derive(Debug)]
pub struct Ledger {
    /// Durable entry log and domain records
    storage: Arc<Storage>,

    /// Writer rights and cached account state
    locks: AccountLocks,

    /// Metrics
    metrics: Metrics,

    /// Receiver for invariant violations
    alerts: Arc<dyn AlertSink>,
}

impl Ledger {
    /// Open ledger and rebuild every account cache from the log
    pub fn open(config: Config) -> Result<Self> {
        let metrics = Metrics::new().map_err(|e| Error::Config(format!("metrics: {}", e)))?;
        let alerts = Arc::new(TracingAlertSink::new(metrics.clone()));
        Self::open_with(config, metrics, alerts)
    }

    /// Open ledger with explicit metrics and alert sink
    pub fn open_with(config: Config, metrics: Metrics, alerts: Arc<dyn AlertSink>) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let ledger = Self {
            storage,
            locks: AccountLocks::new(config.lock_timeout()),
            metrics,
            alerts,
        };
        ledger.replay()?;
        Ok(ledger)
    }

    /// Rebuild cached state from the full log
    fn replay(&self) -> Result<()> {
        let entries = self.storage.scan_all_entries()?;
        let total = entries.len();

        // Keys sort by account, so each account's log is contiguous
        let mut halted = 0usize;
        for group in entries.chunk_by(|a, b| a.account_id == b.account_id) {
            let account_id = group[0].account_id.clone();
            match AccountState::replay(group) {
                Ok(state) => self.locks.install(account_id, state),
                Err(Error::InvariantViolation { detail, .. }) => {
                    halted += 1;
                    let state = AccountState {
                        halted: Some(detail.clone()),
                        ..AccountState::default()
                    };
                    self.locks.install(account_id.clone(), state);
                    self.raise(&account_id, detail);
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            entries = total,
            accounts = self.locks.len(),
            halted,
            "Ledger replayed"
        );
        Ok(())
    }

    /// Acquire the account's writer right and open a transaction
    ///
    /// Fails with `Busy` when the right is not granted within the lock
    /// timeout, and with `InvariantViolation` when the account is halted.
    pub async fn begin(&self, account_id: &AccountId) -> Result<AccountTxn<'_>> {
        let (guard, waited) = match self.locks.acquire(account_id).await {
            Ok(acquired) => acquired,
            Err(e) => {
                if matches!(e, Error::Busy { .. }) {
                    self.metrics.record_busy();
                }
                return Err(e);
            }
        };
        self.metrics.record_lock_wait(waited.as_secs_f64());

        if let Some(detail) = &guard.halted {
            return Err(Error::InvariantViolation {
                account_id: account_id.to_string(),
                detail: detail.clone(),
            });
        }

        Ok(AccountTxn {
            ledger: self,
            account_id: account_id.clone(),
            staged: (*guard).clone(),
            guard,
            pending: Vec::new(),
            writes: WriteSet::new(),
        })
    }

    /// Credit an account (EARN, UNSTAKE, STAKE_REWARD)
    pub async fn credit(
        &self,
        account_id: &AccountId,
        kind: EntryKind,
        amount: Decimal,
        reference: Uuid,
    ) -> Result<Posting> {
        let mut txn = self.begin(account_id).await?;
        let posting = txn.credit(kind, amount, reference)?;
        txn.commit()?;
        Ok(posting)
    }

    /// Debit an account (STAKE, CLAIM)
    pub async fn debit(
        &self,
        account_id: &AccountId,
        kind: EntryKind,
        amount: Decimal,
        reference: Uuid,
    ) -> Result<Posting> {
        let mut txn = self.begin(account_id).await?;
        let posting = txn.debit(kind, amount, reference)?;
        txn.commit()?;
        Ok(posting)
    }

    /// Current balance and staked total
    pub async fn snapshot(&self, account_id: &AccountId) -> Result<AccountSnapshot> {
        match self.locks.acquire_existing(account_id).await? {
            Some((guard, _)) => Ok(AccountSnapshot::from_state(account_id, &guard)),
            None => Ok(AccountSnapshot::from_state(account_id, &AccountState::default())),
        }
    }

    /// Full entry history of an account
    pub fn entries(&self, account_id: &AccountId) -> Result<Vec<LedgerEntry>> {
        self.storage.get_entries(account_id)
    }

    /// Recompute the account from its log and compare with the cache
    ///
    /// A mismatch halts the account and raises an alert; it is never
    /// corrected in place.
    pub async fn reconcile(&self, account_id: &AccountId) -> Result<AccountSnapshot> {
        let mut guard = match self.locks.acquire_existing(account_id).await? {
            Some((guard, _)) => guard,
            // Never written since open: an empty log needs no slot
            None if self.storage.get_entries(account_id)?.is_empty() => {
                return Ok(AccountSnapshot::from_state(account_id, &AccountState::default()));
            }
            None => self.locks.acquire(account_id).await?.0,
        };

        if let Some(detail) = &guard.halted {
            return Err(Error::InvariantViolation {
                account_id: account_id.to_string(),
                detail: detail.clone(),
            });
        }

        let log = self.storage.get_entries(account_id)?;
        let detail = match AccountState::replay(&log) {
            Ok(rebuilt) if rebuilt.agrees_with(&guard) => {
                return Ok(AccountSnapshot::from_state(account_id, &guard));
            }
            Ok(rebuilt) => format!(
                "cache balance {} staked {} entries {}; log balance {} staked {} entries {}",
                guard.balance,
                guard.staked,
                guard.next_sequence,
                rebuilt.balance,
                rebuilt.staked,
                rebuilt.next_sequence
            ),
            Err(Error::InvariantViolation { detail, .. }) => detail,
            Err(e) => return Err(e),
        };

        Err(self.halt(&mut guard, account_id, detail))
    }

    /// Reconcile every known account
    pub async fn reconcile_all(&self) -> ReconciliationReport {
        let mut report = ReconciliationReport {
            checked: 0,
            balanced: 0,
            busy: Vec::new(),
            violations: Vec::new(),
            failed: Vec::new(),
        };

        for account_id in self.locks.accounts() {
            report.checked += 1;
            match self.reconcile(&account_id).await {
                Ok(_) => report.balanced += 1,
                Err(Error::InvariantViolation { detail, .. }) => {
                    report.violations.push((account_id, detail))
                }
                Err(Error::Busy { .. }) => report.busy.push(account_id),
                Err(e) => report.failed.push((account_id, e.to_string())),
            }
        }

        tracing::info!(
            checked = report.checked,
            balanced = report.balanced,
            violations = report.violations.len(),
            busy = report.busy.len(),
            "Reconciliation sweep complete"
        );
        report
    }

    fn halt(&self, guard: &mut AccountGuard, account_id: &AccountId, detail: String) -> Error {
        guard.halted = Some(detail.clone());
        self.raise(account_id, detail.clone());
        Error::InvariantViolation {
            account_id: account_id.to_string(),
            detail,
        }
    }

    fn raise(&self, account_id: &AccountId, detail: String) {
        self.alerts.raise(&InvariantAlert {
            account_id: account_id.clone(),
            detail,
            detected_at: Utc::now(),
        });
    }

    /// Accounts with cached state
    pub fn accounts(&self) -> Vec<AccountId> {
        self.locks.accounts()
    }

    /// Underlying storage (reads and lock-free record writes)
    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

/// Result of a reconciliation sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Accounts examined
    pub checked: usize,
    /// Accounts whose cache matched the log
    pub balanced: usize,
    /// Accounts skipped because a writer held them
    pub busy: Vec<AccountId>,
    /// Accounts halted by this or an earlier sweep
    pub violations: Vec<(AccountId, String)>,
    /// Accounts that could not be read
    pub failed: Vec<(AccountId, String)>,
}

/// Staged mutation of one account, holding its writer right
///
/// Nothing reaches storage until [`AccountTxn::commit`]. Dropping the
/// transaction discards every staged entry and record.
#[derive(Debug)]
pub struct AccountTxn<'a> {
    ledger: &'a Ledger,
    account_id: AccountId,
    guard: AccountGuard,
    staged: AccountState,
    pending: Vec<LedgerEntry>,
    writes: WriteSet,
}

impl AccountTxn<'_> {
    /// Account under mutation
    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    /// Balance including staged entries
    pub fn balance(&self) -> Decimal {
        self.staged.balance
    }

    /// Staked total including staged entries
    pub fn staked(&self) -> Decimal {
        self.staged.staked
    }

    /// Stage a credit
    pub fn credit(&mut self, kind: EntryKind, amount: Decimal, reference: Uuid) -> Result<Posting> {
        if !kind.is_credit() {
            return Err(Error::Validation(format!("{} is not a credit kind", kind)));
        }
        self.post(kind, amount, reference)
    }

    /// Stage a debit; fails with `InsufficientBalance` without side effects
    pub fn debit(&mut self, kind: EntryKind, amount: Decimal, reference: Uuid) -> Result<Posting> {
        if kind.is_credit() {
            return Err(Error::Validation(format!("{} is not a debit kind", kind)));
        }
        self.post(kind, amount, reference)
    }

    fn post(&mut self, kind: EntryKind, amount: Decimal, reference: Uuid) -> Result<Posting> {
        if amount <= Decimal::ZERO {
            return Err(Error::Validation(format!("amount must be positive, got {}", amount)));
        }

        if let Some(entry) = self.find_posting(kind, &reference)? {
            self.ledger.metrics.record_replay();
            tracing::debug!(
                account_id = %self.account_id,
                kind = %kind,
                reference = %reference,
                "Posting already applied"
            );
            return Ok(Posting {
                entry,
                replayed: true,
            });
        }

        let signed = if kind.is_credit() {
            amount
        } else {
            if self.staged.balance < amount {
                return Err(Error::InsufficientBalance {
                    account_id: self.account_id.to_string(),
                    available: self.staged.balance,
                    requested: amount,
                });
            }
            -amount
        };

        let entry = LedgerEntry {
            entry_id: Uuid::now_v7(),
            account_id: self.account_id.clone(),
            sequence: self.staged.next_sequence,
            kind,
            amount: signed,
            balance_after: self.staged.balance + signed,
            reference,
            timestamp: Utc::now(),
        };

        self.staged.apply(&entry)?;
        self.writes.put_entry(&entry)?;
        self.pending.push(entry.clone());

        Ok(Posting {
            entry,
            replayed: false,
        })
    }

    /// Entry already posted (or staged) for (kind, reference)
    pub fn find_posting(&self, kind: EntryKind, reference: &Uuid) -> Result<Option<LedgerEntry>> {
        if let Some(entry) = self
            .pending
            .iter()
            .find(|e| e.kind == kind && e.reference == *reference)
        {
            return Ok(Some(entry.clone()));
        }
        self.ledger
            .storage
            .find_posting(&self.account_id, kind, reference)
    }

    /// Stage a domain record to commit with the entries
    pub fn put_record<T: Serialize>(&mut self, collection: Collection, id: &Uuid, record: &T) -> Result<()> {
        self.writes.put_record(collection, id, record)
    }

    /// Stage a secondary index entry
    pub fn put_index(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.writes.put_index(key, value);
    }

    /// Storage for reads made under the writer right
    pub fn storage(&self) -> &Storage {
        &self.ledger.storage
    }

    /// Atomically write everything staged and publish the new state
    pub fn commit(self) -> Result<Vec<LedgerEntry>> {
        let AccountTxn {
            ledger,
            account_id,
            mut guard,
            staged,
            pending,
            writes,
        } = self;

        ledger.storage.commit(writes)?;
        *guard = staged;
        ledger.metrics.record_entries(pending.len());

        for entry in &pending {
            tracing::debug!(
                account_id = %account_id,
                sequence = entry.sequence,
                kind = %entry.kind,
                amount = %entry.amount,
                balance = %entry.balance_after,
                reference = %entry.reference,
                "Entry committed"
            );
        }

        Ok(pending)
    }
}

#[cfg(test)]
impl Ledger {
    /// Skew an account's cache without touching the log
    pub(crate) async fn skew_cache(&self, account_id: &AccountId, delta: Decimal) {
        let (mut guard, _) = self.locks.acquire(account_id).await.unwrap();
        guard.balance += delta;
    }
}
