//! Aggregate node configuration
//!
//! ```toml
//! [ledger]
//! data_dir = "./data/greenmiles"
//! lock_timeout_ms = 3000
//!
//! [rewards]
//! baseline_kg_per_km = "0.25"
//!
//! [verifier]
//! max_submissions_per_window = 10
//!
//! [staking]
//! sweep_interval_secs = 3600
//! ```

use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use trip_engine::{IngestConfig, RewardConfig, VerifierConfig};

/// Path of the TOML config file, when set
pub const CONFIG_PATH_ENV: &str = "GREENMILES_CONFIG";

/// Node configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage and account locking
    pub ledger: ledger_core::Config,

    /// Emission factor table
    pub rewards: RewardConfig,

    /// Speed bands
    pub ingest: IngestConfig,

    /// Rate ceiling and attestation threshold
    pub verifier: VerifierConfig,

    /// Tiers and sweep interval
    pub staking: staking_engine::Config,
}

impl Config {
    /// Trip engine sections
    pub fn trips(&self) -> trip_engine::Config {
        trip_engine::Config {
            rewards: self.rewards.clone(),
            ingest: self.ingest.clone(),
            verifier: self.verifier.clone(),
        }
    }

    /// Check every section
    pub fn validate(&self) -> Result<()> {
        self.rewards.validate()?;
        self.staking.validate()?;
        if !(0.0..=1.0).contains(&self.verifier.min_attestation_confidence) {
            return Err(GatewayError::Config(format!(
                "min_attestation_confidence must be within [0, 1], got {}",
                self.verifier.min_attestation_confidence
            )));
        }
        if self.verifier.rate_window_hours <= 0 {
            return Err(GatewayError::Config("rate_window_hours must be positive".to_string()));
        }
        Ok(())
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GatewayError::Config(format!("Failed to read config: {}", e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| GatewayError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the per-crate `GREENMILES_*` environment variables
    pub fn from_env() -> Result<Self> {
        let trips = trip_engine::Config::from_env()?;
        let config = Config {
            ledger: ledger_core::Config::from_env()?,
            rewards: trips.rewards,
            ingest: trips.ingest,
            verifier: trips.verifier,
            staking: staking_engine::Config::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// File named by `GREENMILES_CONFIG` if set, otherwise the environment
    pub fn load() -> Result<Self> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path),
            Err(_) => Self::from_env(),
        }
    }
}
