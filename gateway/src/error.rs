//! Gateway error type

use ledger_core::ErrorKind;
use thiserror::Error;

/// Error returned by the rewards facade
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Ledger failure
    #[error(transparent)]
    Ledger(#[from] ledger_core::Error),

    /// Device, ingestion or verification failure
    #[error(transparent)]
    Trip(#[from] trip_engine::Error),

    /// Staking failure
    #[error(transparent)]
    Staking(#[from] staking_engine::Error),

    /// Claim failure
    #[error(transparent)]
    Claim(#[from] claims_service::ClaimError),

    /// Invalid node configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl GatewayError {
    /// Taxonomy kind, for mapping onto a transport status
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Ledger(e) => e.kind(),
            GatewayError::Trip(e) => e.kind(),
            GatewayError::Staking(e) => e.kind(),
            GatewayError::Claim(e) => e.kind(),
            GatewayError::Config(_) => ErrorKind::Internal,
        }
    }

    /// Safe for the caller to retry with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Busy | ErrorKind::Unavailable)
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, GatewayError>;
