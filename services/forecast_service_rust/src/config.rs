use anyhow::{anyhow, Context, Result};
use std::env;
use std::str::FromStr;

use playoff_rust_core::{ConferenceFilter, PlayoffRound, TeamId};

/// Default league snapshot location (relative to the service directory)
pub const DEFAULT_SNAPSHOT_PATH: &str = "data/league_snapshot.json";

/// Engine operation to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Standings,
    Bracket,
    Odds,
    Series,
    Tournament,
    TeamOdds,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "standings" => Ok(Command::Standings),
            "bracket" => Ok(Command::Bracket),
            "odds" | "championship-odds" => Ok(Command::Odds),
            "series" => Ok(Command::Series),
            "tournament" => Ok(Command::Tournament),
            "team-odds" => Ok(Command::TeamOdds),
            other => Err(anyhow!(
                "Invalid FORECAST_COMMAND: {} (expected standings, bracket, odds, series, tournament or team-odds)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub snapshot_path: String,
    pub command: Command,
    pub conference: ConferenceFilter,
    /// Falls back to the engine's per-operation default
    pub simulations: Option<u32>,
    pub team_id: Option<TeamId>,
    pub opponent_id: Option<TeamId>,
    pub round: PlayoffRound,
    pub seed: Option<u64>,
    pub include_play_in: bool,
    pub use_cached: bool,
    /// JSON file with fixed standings for the tournament command
    pub standings_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let snapshot_path =
            env::var("LEAGUE_SNAPSHOT_PATH").unwrap_or_else(|_| DEFAULT_SNAPSHOT_PATH.to_string());

        let command = env::var("FORECAST_COMMAND")
            .unwrap_or_else(|_| "bracket".to_string())
            .parse::<Command>()?;

        let conference = env::var("CONFERENCE")
            .unwrap_or_else(|_| "both".to_string())
            .parse::<ConferenceFilter>()
            .context("CONFERENCE")?;

        let simulations = parse_optional_env::<u32>("SIMULATIONS")?;
        let team_id = parse_optional_env::<TeamId>("TEAM_ID")?;
        let opponent_id = parse_optional_env::<TeamId>("OPPONENT_ID")?;
        let seed = parse_optional_env::<u64>("SEED")?;

        let round = env::var("ROUND")
            .unwrap_or_else(|_| "first_round".to_string())
            .parse::<PlayoffRound>()
            .context("ROUND")?;

        Ok(Self {
            snapshot_path,
            command,
            conference,
            simulations,
            team_id,
            opponent_id,
            round,
            seed,
            include_play_in: parse_bool_env("INCLUDE_PLAY_IN", true),
            use_cached: parse_bool_env("USE_CACHED", true),
            standings_path: env::var("STANDINGS_PATH").ok().filter(|p| !p.trim().is_empty()),
        })
    }
}

fn parse_optional_env<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow!("Invalid {key}: {raw} ({e})")),
        _ => Ok(None),
    }
}

fn parse_bool_env(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on"))
        .unwrap_or(default)
}
