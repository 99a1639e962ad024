//! Configuration for trip ingestion, verification and rewards
//!
//! Decimal values are written as strings in TOML (`baseline_kg_per_km = "0.25"`).

use crate::{Error, Result, TransportMode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Trip engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Emission factors and token rates
    pub rewards: RewardConfig,

    /// Plausibility bands
    pub ingest: IngestConfig,

    /// Rate ceiling and attestation threshold
    pub verifier: VerifierConfig,
}

/// Emission factor and token rate for one mode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeRate {
    /// kg CO₂ per km emitted by this mode
    pub emission_kg_per_km: Decimal,

    /// Tokens per kg CO₂ saved
    pub tokens_per_kg: Decimal,
}

impl ModeRate {
    fn new(emission_kg_per_km: Decimal) -> Self {
        Self {
            emission_kg_per_km,
            tokens_per_kg: Decimal::from(8),
        }
    }
}

/// Reward table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// kg CO₂ per km of an average private car
    pub baseline_kg_per_km: Decimal,

    /// Walking
    pub walking: ModeRate,

    /// Cycling
    pub cycling: ModeRate,

    /// Public transport
    pub public_transport: ModeRate,

    /// Electric vehicle
    pub electric_vehicle: ModeRate,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            baseline_kg_per_km: Decimal::new(25, 2),
            walking: ModeRate::new(Decimal::ZERO),
            cycling: ModeRate::new(Decimal::ZERO),
            public_transport: ModeRate::new(Decimal::new(10, 2)),
            electric_vehicle: ModeRate::new(Decimal::new(5, 2)),
        }
    }
}

impl RewardConfig {
    /// Rate for a mode
    pub fn rate(&self, mode: TransportMode) -> &ModeRate {
        match mode {
            TransportMode::Walking => &self.walking,
            TransportMode::Cycling => &self.cycling,
            TransportMode::PublicTransport => &self.public_transport,
            TransportMode::ElectricVehicle => &self.electric_vehicle,
        }
    }

    /// Reject tables that could produce negative savings or rewards
    pub fn validate(&self) -> Result<()> {
        if self.baseline_kg_per_km <= Decimal::ZERO {
            return Err(Error::InvalidConfig(format!(
                "baseline_kg_per_km must be positive, got {}",
                self.baseline_kg_per_km
            )));
        }
        for mode in TransportMode::ALL {
            let rate = self.rate(mode);
            if rate.emission_kg_per_km < Decimal::ZERO || rate.emission_kg_per_km > self.baseline_kg_per_km {
                return Err(Error::InvalidConfig(format!(
                    "{} emission factor {} outside [0, {}]",
                    mode, rate.emission_kg_per_km, self.baseline_kg_per_km
                )));
            }
            if rate.tokens_per_kg < Decimal::ZERO {
                return Err(Error::InvalidConfig(format!(
                    "{} token rate {} is negative",
                    mode, rate.tokens_per_kg
                )));
            }
        }
        Ok(())
    }
}

/// Plausibility bands (maximum average speed per mode, km/h)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Walking ceiling
    pub walking_max_kmh: Decimal,
    /// Cycling ceiling
    pub cycling_max_kmh: Decimal,
    /// Public transport ceiling
    pub public_transport_max_kmh: Decimal,
    /// Electric vehicle ceiling
    pub electric_vehicle_max_kmh: Decimal,
    /// Allowed gap between the claimed duration and end minus start
    pub duration_tolerance_minutes: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            walking_max_kmh: Decimal::from(7),
            cycling_max_kmh: Decimal::from(40),
            public_transport_max_kmh: Decimal::from(120),
            electric_vehicle_max_kmh: Decimal::from(150),
            duration_tolerance_minutes: 1,
        }
    }
}

impl IngestConfig {
    /// Speed ceiling for a mode
    pub fn max_speed(&self, mode: TransportMode) -> Decimal {
        match mode {
            TransportMode::Walking => self.walking_max_kmh,
            TransportMode::Cycling => self.cycling_max_kmh,
            TransportMode::PublicTransport => self.public_transport_max_kmh,
            TransportMode::ElectricVehicle => self.electric_vehicle_max_kmh,
        }
    }
}

/// Verification settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Submissions allowed per device inside the rate window
    pub max_submissions_per_window: u32,

    /// Rolling window length (hours)
    pub rate_window_hours: i64,

    /// Genuine attestations below this confidence are rejected
    pub min_attestation_confidence: f64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            max_submissions_per_window: 10,
            rate_window_hours: 24,
            min_attestation_confidence: 0.8,
        }
    }
}

impl VerifierConfig {
    /// Rate window as a chrono duration
    pub fn rate_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.rate_window_hours)
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidConfig(format!("Failed to read config: {}", e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::InvalidConfig(format!("Failed to parse config: {}", e)))?;
        config.rewards.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(value) = std::env::var("GREENMILES_VERIFIER_MAX_SUBMISSIONS") {
            config.verifier.max_submissions_per_window = parse_env("GREENMILES_VERIFIER_MAX_SUBMISSIONS", &value)?;
        }

        if let Ok(value) = std::env::var("GREENMILES_VERIFIER_WINDOW_HOURS") {
            config.verifier.rate_window_hours = parse_env("GREENMILES_VERIFIER_WINDOW_HOURS", &value)?;
        }

        if let Ok(value) = std::env::var("GREENMILES_VERIFIER_MIN_CONFIDENCE") {
            config.verifier.min_attestation_confidence = parse_env("GREENMILES_VERIFIER_MIN_CONFIDENCE", &value)?;
        }

        if let Ok(value) = std::env::var("GREENMILES_REWARDS_TOKENS_PER_KG") {
            let rate: Decimal = parse_env("GREENMILES_REWARDS_TOKENS_PER_KG", &value)?;
            for mode in [
                &mut config.rewards.walking,
                &mut config.rewards.cycling,
                &mut config.rewards.public_transport,
                &mut config.rewards.electric_vehicle,
            ] {
                mode.tokens_per_kg = rate;
            }
        }

        config.rewards.validate()?;
        Ok(config)
    }
}

fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| Error::InvalidConfig(format!("Invalid {}: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_reward_table() {
        let rewards = RewardConfig::default();
        assert_eq!(rewards.baseline_kg_per_km, dec!(0.25));
        assert_eq!(rewards.rate(TransportMode::Walking).emission_kg_per_km, Decimal::ZERO);
        assert_eq!(rewards.rate(TransportMode::PublicTransport).emission_kg_per_km, dec!(0.10));
        assert!(TransportMode::ALL
            .iter()
            .all(|m| rewards.rate(*m).tokens_per_kg == dec!(8)));
        assert!(rewards.validate().is_ok());
    }

    #[test]
    fn test_emission_above_baseline_rejected() {
        let mut rewards = RewardConfig::default();
        rewards.electric_vehicle.emission_kg_per_km = dec!(0.30);
        assert!(matches!(rewards.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [verifier]
            max_submissions_per_window = 3

            [ingest]
            cycling_max_kmh = "35"
            "#,
        )
        .unwrap();

        assert_eq!(config.verifier.max_submissions_per_window, 3);
        assert_eq!(config.verifier.rate_window_hours, 24);
        assert_eq!(config.ingest.max_speed(TransportMode::Cycling), dec!(35));
        assert_eq!(config.ingest.max_speed(TransportMode::Walking), dec!(7));
    }
}
