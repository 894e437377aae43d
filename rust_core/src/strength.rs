//! Team strength lookup.
//!
//! Holds one rating and home-court offset per team for the duration of a
//! single engine call. Simulation code works with dense team indices; ids are
//! resolved once at the edge.

use rustc_hash::FxHashMap;

use crate::error::{ForecastError, Result};
use crate::models::{Conference, ConferencePair, TeamId, TeamRating};

#[derive(Debug, Clone)]
pub struct StrengthModel {
    teams: Vec<TeamRating>,
    index: FxHashMap<TeamId, usize>,
    members: ConferencePair<Vec<usize>>,
}

impl StrengthModel {
    pub fn new(ratings: Vec<TeamRating>) -> Result<Self> {
        if ratings.is_empty() {
            return Err(ForecastError::invalid("no team ratings supplied"));
        }

        let mut index = FxHashMap::default();
        let mut members: ConferencePair<Vec<usize>> = ConferencePair::default();

        for (idx, team) in ratings.iter().enumerate() {
            if !team.rating.is_finite() || !team.home_advantage.is_finite() {
                return Err(ForecastError::invalid(format!(
                    "team {} has a non-finite rating",
                    team.team_id
                )));
            }
            if index.insert(team.team_id, idx).is_some() {
                return Err(ForecastError::invalid(format!(
                    "team {} rated more than once",
                    team.team_id
                )));
            }
            members.get_mut(team.conference).push(idx);
        }

        Ok(Self {
            teams: ratings,
            index,
            members,
        })
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    pub fn index_of(&self, team_id: TeamId) -> Option<usize> {
        self.index.get(&team_id).copied()
    }

    /// Resolve a team id, failing with NotFound for teams outside the roster
    pub fn require(&self, team_id: TeamId) -> Result<usize> {
        self.index_of(team_id).ok_or(ForecastError::NotFound(team_id))
    }

    pub fn teams(&self) -> &[TeamRating] {
        &self.teams
    }

    #[inline]
    pub fn team_id(&self, idx: usize) -> TeamId {
        self.teams[idx].team_id
    }

    #[inline]
    pub fn rating(&self, idx: usize) -> f64 {
        self.teams[idx].rating
    }

    #[inline]
    pub fn home_advantage(&self, idx: usize) -> f64 {
        self.teams[idx].home_advantage
    }

    #[inline]
    pub fn conference(&self, idx: usize) -> Conference {
        self.teams[idx].conference
    }

    /// Team indices of one conference, in input order
    pub fn members(&self, conference: Conference) -> &[usize] {
        self.members.get(conference)
    }
}
