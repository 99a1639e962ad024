//! Error types for the ledger

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Caller-facing error classification shared by every Green Miles crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed or implausible input
    Validation,
    /// Submission already recorded; safe to treat as success
    DuplicateSubmission,
    /// Not enough funds
    InsufficientBalance,
    /// Unknown device, trip, stake, claim or catalog entry
    NotFound,
    /// Known but inactive or exhausted
    Unavailable,
    /// Writer right not acquired in time; retry with backoff
    Busy,
    /// Ledger cache disagrees with its log; fatal for the account
    InvariantViolation,
    /// Stake is still locked
    NotMatured,
    /// Operation not allowed from the record's current status
    InvalidState,
    /// Storage, serialization or IO failure
    Internal,
}

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Rejected input (non-positive amount, wrong entry kind)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Debit exceeds available balance
    #[error("Insufficient balance on {account_id}: available {available}, requested {requested}")]
    InsufficientBalance {
        /// Account debited
        account_id: String,
        /// Balance at the time of the attempt
        available: Decimal,
        /// Amount requested
        requested: Decimal,
    },

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Per-account writer right not acquired within the lock timeout
    #[error("Account {account_id} busy after {waited_ms}ms")]
    Busy {
        /// Contended account
        account_id: String,
        /// Time spent waiting
        waited_ms: u64,
    },

    /// Cached balance disagrees with the entry log
    #[error("Invariant violation on {account_id}: {detail}")]
    InvariantViolation {
        /// Affected account
        account_id: String,
        /// What disagreed
        detail: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Busy { .. } => ErrorKind::Busy,
            Error::InvariantViolation { .. } => ErrorKind::InvariantViolation,
            Error::Storage(_) | Error::Serialization(_) | Error::Config(_) | Error::Io(_) => {
                ErrorKind::Internal
            }
        }
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
