//! Error types for staking engine

use chrono::{DateTime, Utc};
use ledger_core::ErrorKind;
use thiserror::Error;
use uuid::Uuid;

/// Result type for staking operations
pub type Result<T> = std::result::Result<T, Error>;

/// Staking errors
#[derive(Error, Debug)]
pub enum Error {
    /// Ledger error
    #[error(transparent)]
    Ledger(#[from] ledger_core::Error),

    /// Rejected request (amount, duration)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown stake position
    #[error("Stake not found: {0}")]
    StakeNotFound(Uuid),

    /// Position still locked
    #[error("Stake {stake_id} matures at {matures_at}")]
    NotMatured {
        /// Position
        stake_id: Uuid,
        /// End of the lock period
        matures_at: DateTime<Utc>,
    },

    /// Position status does not allow the operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Ledger(e) => e.kind(),
            Error::Validation(_) => ErrorKind::Validation,
            Error::StakeNotFound(_) => ErrorKind::NotFound,
            Error::NotMatured { .. } => ErrorKind::NotMatured,
            Error::InvalidState(_) => ErrorKind::InvalidState,
            Error::Config(_) => ErrorKind::Internal,
        }
    }
}
