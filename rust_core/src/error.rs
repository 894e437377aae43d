//! Error taxonomy for the forecasting engine.
//!
//! Running out of time budget is not an error: partial results come back as
//! successes carrying `simulations_used` and `complete = false`.

use thiserror::Error;

use crate::models::TeamId;

#[derive(Debug, Error)]
pub enum ForecastError {
    /// Rejected before any compute begins
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Upstream data source unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Team not found in current season: {0}")]
    NotFound(TeamId),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The blocking simulation task was cancelled before it finished
    #[error("Simulation task failed: {0}")]
    TaskFailed(String),
}

impl ForecastError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ForecastError::InvalidInput(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        ForecastError::UpstreamUnavailable(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
