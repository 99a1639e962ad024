use ledger_core::ErrorKind;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ClaimError {
    #[error(transparent)]
    Ledger(#[from] ledger_core::Error),

    #[error("Reward not found: {0}")]
    RewardNotFound(String),

    #[error("Reward unavailable: {0}")]
    RewardUnavailable(String),

    #[error("Claim not found: {0}")]
    ClaimNotFound(Uuid),

    #[error("Catalog lookup failed: {0}")]
    CatalogUnavailable(String),

    #[error("Invalid claim request: {0}")]
    InvalidInput(String),

    #[error("Invalid claim state: {0}")]
    InvalidState(String),
}

impl ClaimError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClaimError::Ledger(e) => e.kind(),
            ClaimError::RewardNotFound(_) | ClaimError::ClaimNotFound(_) => ErrorKind::NotFound,
            ClaimError::RewardUnavailable(_) | ClaimError::CatalogUnavailable(_) => ErrorKind::Unavailable,
            ClaimError::InvalidInput(_) => ErrorKind::Validation,
            ClaimError::InvalidState(_) => ErrorKind::InvalidState,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClaimError>;
