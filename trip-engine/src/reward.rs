//! Reward calculation
//!
//! Pure function of (mode, distance): no clock, no randomness, no I/O.
//!
//! ```text
//! co2_saved = round1(distance × (baseline − mode_factor))
//! tokens    = round2(co2_saved × tokens_per_kg)
//! ```
//!
//! Both roundings are midpoint-to-even, so walking 1.8 km saves
//! 0.45 → 0.4 kg and earns 3.2 tokens.

use crate::{config::RewardConfig, Result, TransportMode};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Outcome of a reward computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardQuote {
    /// kg CO₂ saved versus the car baseline
    pub co2_saved_kg: Decimal,
    /// Tokens earned
    pub tokens: Decimal,
}

/// Reward calculator
#[derive(Debug, Clone)]
pub struct RewardCalculator {
    config: RewardConfig,
}

impl RewardCalculator {
    /// Create calculator from a validated table
    pub fn new(config: RewardConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Compute the reward for a trip
    ///
    /// Non-positive distances earn nothing.
    pub fn compute(&self, mode: TransportMode, distance_km: Decimal) -> RewardQuote {
        if distance_km <= Decimal::ZERO {
            return RewardQuote {
                co2_saved_kg: Decimal::ZERO,
                tokens: Decimal::ZERO,
            };
        }

        let rate = self.config.rate(mode);
        let saving_per_km = self.config.baseline_kg_per_km - rate.emission_kg_per_km;

        let co2_saved_kg = (distance_km * saving_per_km)
            .round_dp_with_strategy(1, RoundingStrategy::MidpointNearestEven);
        let tokens = (co2_saved_kg * rate.tokens_per_kg)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);

        RewardQuote {
            co2_saved_kg: co2_saved_kg.normalize(),
            tokens: tokens.normalize(),
        }
    }

    /// Reward table in use
    pub fn config(&self) -> &RewardConfig {
        &self.config
    }
}

impl Default for RewardCalculator {
    fn default() -> Self {
        Self {
            config: RewardConfig::default(),
        }
    }
}
