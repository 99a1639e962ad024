//! Green Miles gateway
//!
//! Wires the ledger, trip, staking and claims crates behind one facade and
//! owns the aggregate configuration used by the `greenmiles-node` binary.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod service;

pub use config::Config;
pub use error::{GatewayError, Result};
pub use service::RewardsService;
