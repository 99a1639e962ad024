//! Trip Engine for Green Miles
//!
//! Turns untrusted device submissions into verified trips and EARN credits.
//!
//! ```text
//!   TripSubmission ──► TripIngestor ──► TripVerifier ──► Ledger (EARN)
//!                        │  devices        │  attestor
//!                        │  speed bands    │  rate ceiling
//!                        │  dedupe key     └► RewardCalculator
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod types;
pub mod config;
pub mod reward;
pub mod devices;
pub mod velocity;
pub mod ingest;
pub mod verifier;

pub use error::{Error, Result};
pub use types::*;
pub use config::{Config, IngestConfig, ModeRate, RewardConfig, VerifierConfig};
pub use reward::{RewardCalculator, RewardQuote};
pub use devices::DeviceRegistry;
pub use velocity::{SubmissionVelocity, VelocityStats};
pub use ingest::TripIngestor;
pub use verifier::{Attestor, StaticAttestor, TripVerifier};
