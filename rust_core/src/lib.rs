//! Playoff Core - NBA postseason forecasting engine.
//!
//! This crate provides:
//! - Single-game win probability from Elo-style ratings with home court
//! - Exact best-of-N series evaluation (2-2-1-1-1 home pattern)
//! - Monte Carlo regular-season projection (records, ranks, qualification)
//! - Play-in and playoff bracket construction, both as one deterministic
//!   most-likely path and as full stochastic tournament simulation
//! - Parallel trial execution via rayon with per-trial seeded RNGs
//! - TTL cache for simulation results with per-key locking
//! - An async engine facade over a pluggable league data source

pub mod bracket;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod montecarlo;
pub mod season;
pub mod series;
pub mod source;
pub mod strength;
pub mod win_prob;

pub use bracket::{BracketSnapshot, PredictedBracket, SeedingInput, TournamentSummary};
pub use config::EngineConfig;
pub use engine::{
    ChampionshipOdds, PlayoffEngine, RunOptions, StandingsReport, TeamPlayoffOdds,
    TournamentRequest,
};
pub use error::{ForecastError, Result};
pub use models::{
    Conference, ConferenceFilter, LeagueSnapshot, PlayoffRound, ScheduleEntry, SeriesForecast,
    SeriesPrediction, StandingsRow, TeamId, TeamRating, TeamRecord,
};
pub use source::{JsonFileSource, LeagueDataSource, StaticLeagueSource};
