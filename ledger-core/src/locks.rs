//! Per-account writer rights
//!
//! Every account owns one async mutex guarding its cached [`AccountState`].
//! Holding the guard is the writer right: mutations on one account are
//! serialized, while different accounts never contend.
//!
//! ```text
//!   credit(alice) ──┐
//!   claim(alice) ───┼──► slot(alice) ── Mutex<AccountState>
//!   stake(alice) ───┘
//!   credit(bob) ────────► slot(bob)   ── Mutex<AccountState>
//! ```

use crate::{types::AccountState, AccountId, Error, Result};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Exclusive access to one account's cached state
pub type AccountGuard = OwnedMutexGuard<AccountState>;

/// Arena of account-keyed locks
#[derive(Debug)]
pub struct AccountLocks {
    slots: DashMap<AccountId, Arc<Mutex<AccountState>>>,
    timeout: Duration,
}

impl AccountLocks {
    /// Create an empty arena
    pub fn new(timeout: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            timeout,
        }
    }

    /// Seed an account's state (used during replay, before any writer exists)
    pub fn install(&self, account_id: AccountId, state: AccountState) {
        self.slots.insert(account_id, Arc::new(Mutex::new(state)));
    }

    fn slot(&self, account_id: &AccountId) -> Arc<Mutex<AccountState>> {
        // Clone the Arc out so the shard lock is released before awaiting
        self.slots
            .entry(account_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(AccountState::default())))
            .value()
            .clone()
    }

    /// Acquire the writer right, creating the slot on first use
    ///
    /// Fails with `Busy` after the timeout.
    pub async fn acquire(&self, account_id: &AccountId) -> Result<(AccountGuard, Duration)> {
        let slot = self.slot(account_id);
        self.lock(account_id, slot).await
    }

    /// Like [`acquire`](Self::acquire) but never creates a slot
    ///
    /// Read paths use this so that looking at an unknown account leaves
    /// the arena untouched.
    pub async fn acquire_existing(&self, account_id: &AccountId) -> Result<Option<(AccountGuard, Duration)>> {
        let slot = match self.slots.get(account_id) {
            Some(slot) => slot.value().clone(),
            None => return Ok(None),
        };
        self.lock(account_id, slot).await.map(Some)
    }

    async fn lock(&self, account_id: &AccountId, slot: Arc<Mutex<AccountState>>) -> Result<(AccountGuard, Duration)> {
        let started = Instant::now();

        match tokio::time::timeout(self.timeout, slot.lock_owned()).await {
            Ok(guard) => Ok((guard, started.elapsed())),
            Err(_) => {
                tracing::warn!(
                    account_id = %account_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Writer right not acquired in time"
                );
                Err(Error::Busy {
                    account_id: account_id.to_string(),
                    waited_ms: started.elapsed().as_millis() as u64,
                })
            }
        }
    }

    /// Accounts known to the arena
    pub fn accounts(&self) -> Vec<AccountId> {
        let mut accounts: Vec<AccountId> = self.slots.iter().map(|slot| slot.key().clone()).collect();
        accounts.sort();
        accounts
    }

    /// Number of tracked accounts
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// No accounts tracked
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_writer_times_out() {
        let locks = AccountLocks::new(Duration::from_millis(50));
        let alice = AccountId::new("alice");

        let (_held, _) = locks.acquire(&alice).await.unwrap();
        let err = locks.acquire(&alice).await.unwrap_err();
        assert!(matches!(err, Error::Busy { .. }));
    }

    #[tokio::test]
    async fn test_accounts_do_not_block_each_other() {
        let locks = AccountLocks::new(Duration::from_millis(50));

        let (_alice, _) = locks.acquire(&AccountId::new("alice")).await.unwrap();
        let bob = locks.acquire(&AccountId::new("bob")).await;
        assert!(bob.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_acquire_existing_does_not_create_slots() {
        let locks = AccountLocks::new(Duration::from_millis(50));
        let alice = AccountId::new("alice");

        assert!(locks.acquire_existing(&alice).await.unwrap().is_none());
        assert!(locks.is_empty());

        drop(locks.acquire(&alice).await.unwrap());
        assert!(locks.acquire_existing(&alice).await.unwrap().is_some());

        let (_held, _) = locks.acquire(&alice).await.unwrap();
        let err = locks.acquire_existing(&alice).await.unwrap_err();
        assert!(matches!(err, Error::Busy { .. }));
    }

    #[tokio::test]
    async fn test_released_guard_lets_next_writer_in() {
        let locks = AccountLocks::new(Duration::from_millis(50));
        let alice = AccountId::new("alice");

        {
            let (mut guard, _) = locks.acquire(&alice).await.unwrap();
            guard.next_sequence = 7;
        }

        let (guard, _) = locks.acquire(&alice).await.unwrap();
        assert_eq!(guard.next_sequence, 7);
    }
}
