// Shared models for the playoff forecasting engine
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ForecastError;

// ============================================================================
// Team identity & conference
// ============================================================================

/// League-wide team identifier (NBA API style numeric id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub u32);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TeamId {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.parse::<u32>() {
            Ok(0) | Err(_) => Err(ForecastError::invalid(format!(
                "malformed team id: {:?}",
                s
            ))),
            Ok(id) => Ok(TeamId(id)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Conference {
    #[serde(alias = "eastern", alias = "EASTERN")]
    Eastern,
    #[serde(alias = "western", alias = "WESTERN")]
    Western,
}

impl Conference {
    pub const ALL: [Conference; 2] = [Conference::Eastern, Conference::Western];

    pub fn as_str(&self) -> &'static str {
        match self {
            Conference::Eastern => "Eastern",
            Conference::Western => "Western",
        }
    }
}

impl fmt::Display for Conference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Conference {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "eastern" | "east" => Ok(Conference::Eastern),
            "western" | "west" => Ok(Conference::Western),
            other => Err(ForecastError::invalid(format!(
                "unknown conference: {:?}",
                other
            ))),
        }
    }
}

/// Conference selector for standings requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConferenceFilter {
    Eastern,
    Western,
    Both,
}

impl ConferenceFilter {
    pub fn includes(&self, conference: Conference) -> bool {
        match self {
            ConferenceFilter::Both => true,
            ConferenceFilter::Eastern => conference == Conference::Eastern,
            ConferenceFilter::Western => conference == Conference::Western,
        }
    }
}

impl FromStr for ConferenceFilter {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "eastern" | "east" => Ok(ConferenceFilter::Eastern),
            "western" | "west" => Ok(ConferenceFilter::Western),
            "both" | "all" => Ok(ConferenceFilter::Both),
            other => Err(ForecastError::invalid(format!(
                "unknown conference: {:?} (expected eastern, western or both)",
                other
            ))),
        }
    }
}

/// One value per conference
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConferencePair<T> {
    pub eastern: T,
    pub western: T,
}

impl<T> ConferencePair<T> {
    pub fn new(eastern: T, western: T) -> Self {
        Self { eastern, western }
    }

    pub fn from_fn(mut f: impl FnMut(Conference) -> T) -> Self {
        Self {
            eastern: f(Conference::Eastern),
            western: f(Conference::Western),
        }
    }

    pub fn get(&self, conference: Conference) -> &T {
        match conference {
            Conference::Eastern => &self.eastern,
            Conference::Western => &self.western,
        }
    }

    pub fn get_mut(&mut self, conference: Conference) -> &mut T {
        match conference {
            Conference::Eastern => &mut self.eastern,
            Conference::Western => &mut self.western,
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(Conference, T) -> U) -> ConferencePair<U> {
        ConferencePair {
            eastern: f(Conference::Eastern, self.eastern),
            western: f(Conference::Western, self.western),
        }
    }
}

// ============================================================================
// League inputs (supplied per call, never persisted)
// ============================================================================

/// Opaque strength rating for one team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRating {
    pub team_id: TeamId,
    pub conference: Conference,
    pub rating: f64,
    /// Rating points added when this team hosts
    #[serde(default)]
    pub home_advantage: f64,
}

/// Current-season record to date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub team_id: TeamId,
    pub wins: u16,
    pub losses: u16,
}

impl TeamRecord {
    /// Widened so oversized records cannot overflow
    pub fn games_played(&self) -> u32 {
        self.wins as u32 + self.losses as u32
    }
}

/// One remaining regular-season fixture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub date: NaiveDate,
}

/// Everything the engine consumes from the data collaborator for one call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeagueSnapshot {
    pub season: String,
    pub ratings: Vec<TeamRating>,
    /// Records to date; `None` means the season has not started
    #[serde(default)]
    pub records: Option<Vec<TeamRecord>>,
    #[serde(default)]
    pub schedule: Vec<ScheduleEntry>,
}

// ============================================================================
// Playoff rounds
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayoffRound {
    PlayIn,
    FirstRound,
    ConferenceSemifinals,
    ConferenceFinals,
    NbaFinals,
}

impl PlayoffRound {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayoffRound::PlayIn => "play_in",
            PlayoffRound::FirstRound => "first_round",
            PlayoffRound::ConferenceSemifinals => "conference_semifinals",
            PlayoffRound::ConferenceFinals => "conference_finals",
            PlayoffRound::NbaFinals => "nba_finals",
        }
    }

    /// Play-in games are single elimination; every other round is best-of-7
    pub fn default_best_of(&self) -> u8 {
        match self {
            PlayoffRound::PlayIn => 1,
            _ => 7,
        }
    }
}

impl fmt::Display for PlayoffRound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlayoffRound {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "play_in" | "playin" => Ok(PlayoffRound::PlayIn),
            "first_round" => Ok(PlayoffRound::FirstRound),
            "conference_semifinals" | "semifinals" => Ok(PlayoffRound::ConferenceSemifinals),
            "conference_finals" => Ok(PlayoffRound::ConferenceFinals),
            "nba_finals" | "finals" => Ok(PlayoffRound::NbaFinals),
            other => Err(ForecastError::invalid(format!("unknown round: {:?}", other))),
        }
    }
}

// ============================================================================
// Computed outputs
// ============================================================================

/// Projected final standing of one team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingsRow {
    pub team_id: TeamId,
    pub conference: Conference,
    pub rank: u8,
    pub projected_wins: f64,
    pub projected_losses: f64,
    pub win_pct: f64,
    /// Finished in the top 10 (auto bid or play-in)
    pub playoff_probability: f64,
    pub top_six_probability: f64,
    pub play_in_probability: f64,
    /// Rough proxy only; full odds come from tournament simulation
    pub championship_odds: f64,
    /// Probability of each final rank, index 0 = rank 1
    pub rank_distribution: Vec<f64>,
}

/// Prediction for a single matchup (best_of 1 for play-in games)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPrediction {
    pub team_a: TeamId,
    pub team_b: TeamId,
    pub round: PlayoffRound,
    pub best_of: u8,
    pub home_court_team: TeamId,
    pub win_probability_a: f64,
    pub win_probability_b: f64,
    pub predicted_winner: TeamId,
    pub predicted_game_count: u8,
    pub expected_games: f64,
    pub confidence: f64,
}

/// Single-game view inside a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameBreakdown {
    pub game_number: u8,
    pub home_team: TeamId,
    pub win_probability_a: f64,
    /// Probability the series is still alive when this game tips off
    pub probability_played: f64,
}

/// Exact probability of one series result, e.g. "team A in 6"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesOutcome {
    pub winner: TeamId,
    pub games: u8,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesForecast {
    pub prediction: SeriesPrediction,
    pub game_breakdown: Vec<GameBreakdown>,
    pub outcomes: Vec<SeriesOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamProbability {
    pub team_id: TeamId,
    pub conference: Conference,
    pub probability: f64,
}

/// Probability of reaching each stage of the postseason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundOdds {
    pub team_id: TeamId,
    pub conference: Conference,
    pub play_in: f64,
    pub make_playoffs: f64,
    pub conference_semifinals: f64,
    pub conference_finals: f64,
    pub nba_finals: f64,
    pub championship: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_id_parsing() {
        assert_eq!("1610612738".parse::<TeamId>().unwrap(), TeamId(1610612738));
        assert_eq!(" 42 ".parse::<TeamId>().unwrap(), TeamId(42));

        for bad in ["", "abc", "-5", "0", "12.5"] {
            let err = bad.parse::<TeamId>().unwrap_err();
            assert!(matches!(err, ForecastError::InvalidInput(_)), "{:?}", bad);
        }
    }

    #[test]
    fn test_conference_filter_parsing() {
        assert_eq!("Eastern".parse::<ConferenceFilter>().unwrap(), ConferenceFilter::Eastern);
        assert_eq!("west".parse::<ConferenceFilter>().unwrap(), ConferenceFilter::Western);
        assert_eq!("BOTH".parse::<ConferenceFilter>().unwrap(), ConferenceFilter::Both);
        assert!(matches!(
            "central".parse::<ConferenceFilter>(),
            Err(ForecastError::InvalidInput(_))
        ));

        assert!(ConferenceFilter::Both.includes(Conference::Western));
        assert!(!ConferenceFilter::Eastern.includes(Conference::Western));
    }

    #[test]
    fn test_round_parsing_and_length() {
        assert_eq!("play-in".parse::<PlayoffRound>().unwrap(), PlayoffRound::PlayIn);
        assert_eq!("Finals".parse::<PlayoffRound>().unwrap(), PlayoffRound::NbaFinals);
        assert_eq!(PlayoffRound::PlayIn.default_best_of(), 1);
        assert_eq!(PlayoffRound::ConferenceFinals.default_best_of(), 7);
        assert!("quarterfinals".parse::<PlayoffRound>().is_err());
    }

    #[test]
    fn test_games_played_does_not_overflow() {
        let record = TeamRecord {
            team_id: TeamId(1),
            wins: 30,
            losses: 10,
        };
        assert_eq!(record.games_played(), 40);

        let oversized = TeamRecord {
            team_id: TeamId(2),
            wins: u16::MAX,
            losses: u16::MAX,
        };
        assert_eq!(oversized.games_played(), 2 * u16::MAX as u32);
    }

    #[test]
    fn test_snapshot_deserializes_with_defaults() {
        let json = r#"{
            "season": "2024-25",
            "ratings": [
                {"team_id": 1, "conference": "eastern", "rating": 1550.0},
                {"team_id": 2, "conference": "Western", "rating": 1490.0, "home_advantage": 40.0}
            ]
        }"#;
        let snapshot: LeagueSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.ratings.len(), 2);
        assert_eq!(snapshot.ratings[0].conference, Conference::Eastern);
        assert_eq!(snapshot.ratings[0].home_advantage, 0.0);
        assert!(snapshot.records.is_none());
        assert!(snapshot.schedule.is_empty());
    }
}
