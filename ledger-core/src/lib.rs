//! Green Miles Ledger Core
//!
//! Append-only token ledger with a derived balance cache per account.
//!
//! # Architecture
//!
//! - **Event Sourcing**: Balances and staked totals are derived from immutable entries
//! - **Single Writer per Account**: A keyed lock arena serializes mutations on one
//!   account while leaving other accounts untouched
//! - **Atomic Commit**: Entries, idempotency refs and domain records land in one
//!   RocksDB write batch
//!
//! # Invariants
//!
//! - Conservation: balance == Σ(entry amounts) for every account, at all times
//! - Non-negative: no debit is committed that would drive a balance below zero
//! - Idempotent: (account, kind, reference) is posted at most once
//! - Append-only: entries are never modified or deleted

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod error;
pub mod config;
pub mod storage;
pub mod locks;
pub mod alert;
pub mod ledger;
pub mod metrics;

// Re-exports
pub use error::{Error, ErrorKind, Result};
pub use types::{AccountId, AccountSnapshot, AccountState, EntryKind, LedgerEntry, Posting};
pub use config::Config;
pub use storage::{account_index_key, account_index_prefix, Collection, Storage, WriteSet};
pub use alert::{AlertSink, InvariantAlert, TracingAlertSink};
pub use ledger::{AccountTxn, Ledger, ReconciliationReport};
pub use metrics::Metrics;
