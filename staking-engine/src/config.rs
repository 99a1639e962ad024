//! Configuration for staking engine

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Duration tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeTier {
    /// Lock length in days
    pub days: u32,

    /// APY in basis points (500 = 5%)
    pub apy_bps: u32,
}

/// The fixed duration tiers
pub const TIERS: [StakeTier; 4] = [
    StakeTier { days: 30, apy_bps: 500 },
    StakeTier { days: 90, apy_bps: 750 },
    StakeTier { days: 180, apy_bps: 1_000 },
    StakeTier { days: 365, apy_bps: 1_500 },
];

/// APY for a duration, if it is a tier
pub fn apy_for(days: u32) -> Option<u32> {
    TIERS.iter().find(|t| t.days == days).map(|t| t.apy_bps)
}

/// Staking configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Maturity sweep interval (seconds)
    pub sweep_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 3_600,
        }
    }
}

impl Config {
    /// Check the sweep interval
    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval_secs == 0 {
            return Err(Error::Config("sweep_interval_secs must be positive".to_string()));
        }
        Ok(())
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(interval) = std::env::var("GREENMILES_STAKING_SWEEP_INTERVAL_SECS") {
            config.sweep_interval_secs = interval.parse().map_err(|e| {
                Error::Config(format!("Invalid GREENMILES_STAKING_SWEEP_INTERVAL_SECS: {}", e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_tiers() {
        assert_eq!(apy_for(30), Some(500));
        assert_eq!(apy_for(90), Some(750));
        assert_eq!(apy_for(180), Some(1_000));
        assert_eq!(apy_for(365), Some(1_500));
        assert_eq!(apy_for(60), None);
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_tier_table_not_configurable() {
        let result: std::result::Result<Config, _> = toml::from_str(
            r#"
            sweep_interval_secs = 60

            [[tiers]]
            days = 7
            apy_bps = 200
            "#,
        );
        assert!(result.is_err());

        let config: Config = toml::from_str("sweep_interval_secs = 60").unwrap();
        assert_eq!(config.sweep_interval_secs, 60);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = Config { sweep_interval_secs: 0 };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
