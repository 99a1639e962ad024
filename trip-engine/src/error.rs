//! Error types for trip engine

use ledger_core::ErrorKind;
use thiserror::Error;
use uuid::Uuid;

/// Trip engine error
#[derive(Debug, Error)]
pub enum Error {
    /// Ledger or storage failure
    #[error(transparent)]
    Ledger(#[from] ledger_core::Error),

    /// Malformed or implausible submission
    #[error("Validation error: {0}")]
    Validation(String),

    /// Same device and start/end timestamps already submitted
    #[error("Duplicate submission: already recorded as trip {trip_id}")]
    DuplicateSubmission {
        /// Trip created by the first submission
        trip_id: Uuid,
    },

    /// Device identifier registered to another device
    #[error("Device identifier already registered: {0}")]
    IdentifierTaken(String),

    /// Unknown device
    #[error("Device not found: {0}")]
    DeviceNotFound(Uuid),

    /// Device deactivated
    #[error("Device inactive: {0}")]
    DeviceInactive(Uuid),

    /// Unknown trip
    #[error("Trip not found: {0}")]
    TripNotFound(Uuid),

    /// Attestation collaborator unreachable or failed
    #[error("Attestation unavailable: {0}")]
    AttestationUnavailable(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Ledger(e) => e.kind(),
            Error::Validation(_) | Error::IdentifierTaken(_) => ErrorKind::Validation,
            Error::DuplicateSubmission { .. } => ErrorKind::DuplicateSubmission,
            Error::DeviceNotFound(_) | Error::TripNotFound(_) => ErrorKind::NotFound,
            Error::DeviceInactive(_) | Error::AttestationUnavailable(_) => ErrorKind::Unavailable,
            Error::InvalidConfig(_) => ErrorKind::Internal,
        }
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
