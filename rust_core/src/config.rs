//! Engine configuration and environment loading.
//!
//! This module manages:
//! - Simulation count defaults and the hard maximum
//! - The seed used for the display bracket's odds run
//! - Series length for playoff rounds
//! - Optional wall-clock budget per simulation call
//! - Cache TTLs per result kind

use std::env;
use std::time::Duration;

use tracing::debug;

use crate::error::{ForecastError, Result};
use crate::series::validate_best_of;

/// Upper bound on trials for any one call
pub const DEFAULT_MAX_SIMULATIONS: u32 = 100_000;

pub const DEFAULT_STANDINGS_SIMULATIONS: u32 = 1_000;

pub const DEFAULT_ODDS_SIMULATIONS: u32 = 5_000;

/// Trials behind the champion probabilities shown on the bracket
pub const DEFAULT_BRACKET_SIMULATIONS: u32 = 5_000;

/// Fixed so the bracket snapshot is reproducible
pub const DEFAULT_BRACKET_SEED: u64 = 0x0A11_0FF5;

pub const DEFAULT_SERIES_LENGTH: u8 = 7;

/// 1 hour
pub const DEFAULT_STANDINGS_TTL_SECS: u64 = 3_600;

/// 2 hours
pub const DEFAULT_BRACKET_TTL_SECS: u64 = 7_200;

/// 6 hours
pub const DEFAULT_ODDS_TTL_SECS: u64 = 21_600;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub max_simulations: u32,
    pub default_standings_simulations: u32,
    pub default_odds_simulations: u32,
    pub bracket_simulations: u32,
    pub bracket_seed: u64,
    /// Best-of length for every round after the play-in
    pub series_length: u8,
    /// `None` runs every requested trial
    pub time_budget: Option<Duration>,
    pub standings_ttl: Duration,
    pub bracket_ttl: Duration,
    pub odds_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_simulations: DEFAULT_MAX_SIMULATIONS,
            default_standings_simulations: DEFAULT_STANDINGS_SIMULATIONS,
            default_odds_simulations: DEFAULT_ODDS_SIMULATIONS,
            bracket_simulations: DEFAULT_BRACKET_SIMULATIONS,
            bracket_seed: DEFAULT_BRACKET_SEED,
            series_length: DEFAULT_SERIES_LENGTH,
            time_budget: None,
            standings_ttl: Duration::from_secs(DEFAULT_STANDINGS_TTL_SECS),
            bracket_ttl: Duration::from_secs(DEFAULT_BRACKET_TTL_SECS),
            odds_ttl: Duration::from_secs(DEFAULT_ODDS_TTL_SECS),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl EngineConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let max_simulations = env_parse::<u32>("MAX_SIMULATIONS")
            .unwrap_or(defaults.max_simulations);

        let config = Self {
            max_simulations,
            default_standings_simulations: env_parse::<u32>("STANDINGS_SIMULATIONS")
                .unwrap_or(defaults.default_standings_simulations)
                .clamp(1, max_simulations.max(1)),
            default_odds_simulations: env_parse::<u32>("ODDS_SIMULATIONS")
                .unwrap_or(defaults.default_odds_simulations)
                .clamp(1, max_simulations.max(1)),
            bracket_simulations: env_parse::<u32>("BRACKET_SIMULATIONS")
                .unwrap_or(defaults.bracket_simulations)
                .clamp(1, max_simulations.max(1)),
            bracket_seed: env_parse::<u64>("BRACKET_SEED").unwrap_or(defaults.bracket_seed),
            series_length: env_parse::<u8>("SERIES_LENGTH").unwrap_or(defaults.series_length),
            time_budget: env_parse::<u64>("SIMULATION_BUDGET_MS")
                .filter(|&ms| ms > 0)
                .map(Duration::from_millis),
            standings_ttl: Duration::from_secs(
                env_parse("STANDINGS_CACHE_TTL_SECS").unwrap_or(DEFAULT_STANDINGS_TTL_SECS),
            ),
            bracket_ttl: Duration::from_secs(
                env_parse("BRACKET_CACHE_TTL_SECS").unwrap_or(DEFAULT_BRACKET_TTL_SECS),
            ),
            odds_ttl: Duration::from_secs(
                env_parse("ODDS_CACHE_TTL_SECS").unwrap_or(DEFAULT_ODDS_TTL_SECS),
            ),
        };

        config.validate()?;
        debug!("Loaded engine config: {:?}", config);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let counts = [
            ("MAX_SIMULATIONS", self.max_simulations),
            ("STANDINGS_SIMULATIONS", self.default_standings_simulations),
            ("ODDS_SIMULATIONS", self.default_odds_simulations),
            ("BRACKET_SIMULATIONS", self.bracket_simulations),
        ];
        for (name, count) in counts {
            if count == 0 {
                return Err(ForecastError::Config(format!("{} must be positive", name)));
            }
        }

        validate_best_of(self.series_length).map_err(|_| {
            ForecastError::Config(format!(
                "SERIES_LENGTH must be odd and at most 9, got {}",
                self.series_length
            ))
        })
    }

    /// Reject non-positive counts and cap the rest at the maximum
    pub fn clamp_simulations(&self, requested: u32) -> Result<u32> {
        if requested == 0 {
            return Err(ForecastError::invalid("simulations must be a positive integer"));
        }
        if requested > self.max_simulations {
            debug!(
                "Clamping simulations from {} to {}",
                requested, self.max_simulations
            );
        }
        Ok(requested.min(self.max_simulations))
    }
}
