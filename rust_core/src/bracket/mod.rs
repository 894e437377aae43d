//! Playoff bracket construction.
//!
//! Two separate paths share one topology:
//! - `deterministic`: one most-likely bracket for display, every series
//!   resolved by its exact prediction.
//! - `tournament`: full-bracket Monte Carlo where every game is sampled.
//!   Championship odds only ever come from here.

pub mod deterministic;
pub mod topology;
pub mod tournament;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ConferencePair, SeriesPrediction, TeamId, TeamProbability};

pub use deterministic::predict_bracket;
pub use topology::{BracketStage, PlayInSlot, Seeding, SeedingInput};
pub use tournament::{FinalsMatchup, TournamentSeeding, TournamentSimulator, TournamentSummary};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayInGame {
    pub slot: PlayInSlot,
    pub prediction: SeriesPrediction,
}

/// Play-in of one conference and the two seeds it produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConferencePlayIn {
    pub games: Vec<PlayInGame>,
    pub seventh_seed: TeamId,
    pub eighth_seed: TeamId,
}

/// Single most-likely path through the postseason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedBracket {
    /// Seeding the bracket was built from, best seed first
    pub seeding: ConferencePair<Vec<TeamId>>,
    /// `None` for a conference whose play-in was absorbed
    pub play_in: ConferencePair<Option<ConferencePlayIn>>,
    pub first_round: Vec<SeriesPrediction>,
    pub conference_semifinals: Vec<SeriesPrediction>,
    pub conference_finals: Vec<SeriesPrediction>,
    pub nba_finals: SeriesPrediction,
    pub champion: TeamId,
}

/// Display bracket plus championship odds from a seeded stochastic run.
/// Never mutated; a refresh replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketSnapshot {
    pub generated_at: DateTime<Utc>,
    pub season: String,
    pub simulations_requested: u32,
    pub simulations_used: u32,
    pub complete: bool,
    #[serde(flatten)]
    pub bracket: PredictedBracket,
    pub champion_probabilities: Vec<TeamProbability>,
}
