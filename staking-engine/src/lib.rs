//! Staking Engine
//!
//! Time-locked staking positions against the token ledger.
//!
//! # Lifecycle
//!
//! ```text
//!   create_stake ──► ACTIVE ──settle (at/after end)──► MATURED ──withdraw──► WITHDRAWN
//!        │                                               │
//!   STAKE debit                          STAKE_REWARD credit (principal + reward)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use ledger_core::{AccountId, Ledger};
//! use rust_decimal::Decimal;
//! use staking_engine::{Config, StakingEngine};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> staking_engine::Result<()> {
//!     let ledger = Arc::new(Ledger::open(ledger_core::Config::default())?);
//!     let engine = StakingEngine::new(ledger, Config::default())?;
//!
//!     let stake = engine
//!         .create_stake(&AccountId::new("alice"), Decimal::from(100), 180)
//!         .await?;
//!     println!("stake {} matures {}", stake.id, stake.end_date());
//!     Ok(())
//! }
//! ```

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
pub mod engine;
pub mod scheduler;

// Re-exports
pub use error::{Error, Result};
pub use types::*;
pub use config::{apy_for, Config, StakeTier, TIERS};
pub use engine::{accrued_reward, StakingEngine, SweepReport};
pub use scheduler::MaturityScheduler;
