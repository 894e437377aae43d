//! Regular-season projection.
//!
//! Each trial samples every remaining fixture, adds the results to the
//! current records and ranks both conferences. Ranking is total: final wins,
//! then current-season win percentage, then ascending team id.
//!
//! The championship figure reported here is a proxy (qualifiers weighted by
//! strength and seeding tier). Real odds come from the tournament simulator.

use std::cmp::Ordering;

use rand::Rng;
use tracing::{debug, info};

use crate::bracket::topology::{Seeding, AUTO_BID_SEEDS, PLAY_IN_SEEDS};
use crate::error::{ForecastError, Result};
use crate::models::{Conference, ConferencePair, ScheduleEntry, StandingsRow, TeamRecord};
use crate::montecarlo::{run_trials, Tally, TrialPlan};
use crate::strength::StrengthModel;
use crate::win_prob::{sample_outcome, GameOutcomeSampler, Venue, RATING_SCALE};

/// Title weight of a play-in team relative to a top-six team
const PLAY_IN_TITLE_WEIGHT: f64 = 0.5;

/// A remaining fixture with its probability resolved once up front
#[derive(Debug, Clone, Copy)]
struct ScheduledGame {
    home: usize,
    away: usize,
    home_win_probability: f64,
}

#[derive(Debug, Clone)]
pub struct SeasonProjection {
    pub standings: ConferencePair<Vec<StandingsRow>>,
    pub simulations_requested: u32,
    pub simulations_used: u32,
    pub complete: bool,
}

#[derive(Debug, Clone)]
struct SeasonTally {
    stride: usize,
    wins_total: Vec<u64>,
    /// team * stride + (rank - 1)
    rank_counts: Vec<u32>,
    top_six: Vec<u32>,
    playoffs: Vec<u32>,
    play_in: Vec<u32>,
    title_share: Vec<f64>,
}

impl SeasonTally {
    fn new(teams: usize, stride: usize) -> Self {
        Self {
            stride,
            wins_total: vec![0; teams],
            rank_counts: vec![0; teams * stride],
            top_six: vec![0; teams],
            playoffs: vec![0; teams],
            play_in: vec![0; teams],
            title_share: vec![0.0; teams],
        }
    }
}

fn add_counts<T: Copy + std::ops::AddAssign>(into: &mut [T], from: &[T]) {
    for (a, b) in into.iter_mut().zip(from) {
        *a += *b;
    }
}

impl Tally for SeasonTally {
    fn merge(&mut self, other: Self) {
        add_counts(&mut self.wins_total, &other.wins_total);
        add_counts(&mut self.rank_counts, &other.rank_counts);
        add_counts(&mut self.top_six, &other.top_six);
        add_counts(&mut self.playoffs, &other.playoffs);
        add_counts(&mut self.play_in, &other.play_in);
        add_counts(&mut self.title_share, &other.title_share);
    }
}

#[derive(Debug, Clone)]
pub struct SeasonProjector<'a> {
    model: &'a StrengthModel,
    current_wins: Vec<u32>,
    current_games: Vec<u32>,
    /// Games played plus games remaining
    season_length: Vec<u32>,
    remaining: Vec<ScheduledGame>,
    /// 10^(rating / 400), scaled so the strongest team is 1
    title_weight: Vec<f64>,
}

impl<'a> SeasonProjector<'a> {
    pub fn new(
        model: &'a StrengthModel,
        records: Option<&[TeamRecord]>,
        schedule: &[ScheduleEntry],
    ) -> Result<Self> {
        let teams = model.len();
        for conference in Conference::ALL {
            if model.members(conference).len() > u8::MAX as usize {
                return Err(ForecastError::invalid(format!(
                    "{} conference is too large to rank",
                    conference
                )));
            }
        }

        let mut current_wins = vec![0u32; teams];
        let mut current_games = vec![0u32; teams];
        let mut has_record = vec![false; teams];
        for record in records.unwrap_or_default() {
            let idx = model.index_of(record.team_id).ok_or_else(|| {
                ForecastError::invalid(format!("record for unrated team {}", record.team_id))
            })?;
            if std::mem::replace(&mut has_record[idx], true) {
                return Err(ForecastError::invalid(format!(
                    "duplicate record for team {}",
                    record.team_id
                )));
            }
            current_wins[idx] = record.wins as u32;
            current_games[idx] = record.games_played();
        }

        let sampler = GameOutcomeSampler::new(model);
        let mut season_length = current_games.clone();
        let mut remaining = Vec::with_capacity(schedule.len());
        for entry in schedule {
            let home = model.index_of(entry.home_team_id).ok_or_else(|| {
                ForecastError::invalid(format!("fixture for unrated team {}", entry.home_team_id))
            })?;
            let away = model.index_of(entry.away_team_id).ok_or_else(|| {
                ForecastError::invalid(format!("fixture for unrated team {}", entry.away_team_id))
            })?;
            if home == away {
                return Err(ForecastError::invalid(format!(
                    "team {} scheduled against itself on {}",
                    entry.home_team_id, entry.date
                )));
            }
            season_length[home] += 1;
            season_length[away] += 1;
            remaining.push(ScheduledGame {
                home,
                away,
                home_win_probability: sampler.game_probability(home, away, Venue::HomeA),
            });
        }

        let top = model
            .teams()
            .iter()
            .map(|t| t.rating)
            .fold(f64::NEG_INFINITY, f64::max);
        let title_weight = (0..teams)
            .map(|i| 10f64.powf((model.rating(i) - top) / RATING_SCALE))
            .collect();

        debug!(
            "Season projector ready: {} teams, {} remaining games",
            teams,
            remaining.len()
        );

        Ok(Self {
            model,
            current_wins,
            current_games,
            season_length,
            remaining,
            title_weight,
        })
    }

    pub fn season_length(&self, idx: usize) -> u32 {
        self.season_length[idx]
    }

    /// Current win percentage, higher first. 0-0 counts as .000.
    fn compare_current_pct(&self, a: usize, b: usize) -> Ordering {
        let (wa, ga) = (self.current_wins[a] as u64, self.current_games[a].max(1) as u64);
        let (wb, gb) = (self.current_wins[b] as u64, self.current_games[b].max(1) as u64);
        (wb * ga).cmp(&(wa * gb))
    }

    fn tiebreak(&self, a: usize, b: usize) -> Ordering {
        self.compare_current_pct(a, b)
            .then_with(|| self.model.team_id(a).cmp(&self.model.team_id(b)))
    }

    /// Conference members ordered best first by `wins`
    fn rank_by<W: PartialOrd + Copy>(&self, conference: Conference, wins: &[W]) -> Vec<usize> {
        let mut order = self.model.members(conference).to_vec();
        order.sort_by(|&a, &b| {
            wins[b]
                .partial_cmp(&wins[a])
                .unwrap_or(Ordering::Equal)
                .then_with(|| self.tiebreak(a, b))
        });
        order
    }

    fn sample_final_wins<R: Rng + ?Sized>(&self, rng: &mut R, wins: &mut Vec<u32>) {
        wins.clear();
        wins.extend_from_slice(&self.current_wins);
        for game in &self.remaining {
            if sample_outcome(game.home_win_probability, rng) {
                wins[game.home] += 1;
            } else {
                wins[game.away] += 1;
            }
        }
    }

    fn win_pct(&self, idx: usize, wins: f64) -> f64 {
        match self.season_length[idx] {
            0 => 0.0,
            games => wins / games as f64,
        }
    }

    /// Expected final wins in closed form: current wins plus the single-game
    /// probability of every remaining game
    pub fn expected_wins(&self) -> Vec<f64> {
        let mut wins: Vec<f64> = self.current_wins.iter().map(|&w| w as f64).collect();
        for game in &self.remaining {
            wins[game.home] += game.home_win_probability;
            wins[game.away] += 1.0 - game.home_win_probability;
        }
        wins
    }

    /// Deterministic seeding from expected wins
    pub fn expected_seeding(&self) -> Seeding {
        let wins = self.expected_wins();
        let conferences = ConferencePair::from_fn(|c| self.rank_by(c, &wins));
        let finals_priority = wins
            .iter()
            .enumerate()
            .map(|(i, &w)| self.win_pct(i, w))
            .collect();
        Seeding {
            conferences,
            finals_priority,
        }
    }

    /// Seeding from one sampled season
    pub fn sample_seeding<R: Rng + ?Sized>(&self, rng: &mut R) -> Seeding {
        let mut wins = Vec::with_capacity(self.model.len());
        self.sample_final_wins(rng, &mut wins);
        let conferences = ConferencePair::from_fn(|c| self.rank_by(c, &wins));
        let finals_priority = wins
            .iter()
            .enumerate()
            .map(|(i, &w)| self.win_pct(i, w as f64))
            .collect();
        Seeding {
            conferences,
            finals_priority,
        }
    }

    fn run_trial<R: Rng + ?Sized>(
        &self,
        tally: &mut SeasonTally,
        rng: &mut R,
        wins: &mut Vec<u32>,
    ) {
        self.sample_final_wins(rng, wins);

        let mut qualifiers: Vec<(usize, f64)> = Vec::with_capacity(2 * PLAY_IN_SEEDS);
        for conference in Conference::ALL {
            for (pos, idx) in self.rank_by(conference, wins).into_iter().enumerate() {
                tally.wins_total[idx] += wins[idx] as u64;
                tally.rank_counts[idx * tally.stride + pos] += 1;

                if pos < AUTO_BID_SEEDS {
                    tally.top_six[idx] += 1;
                    tally.playoffs[idx] += 1;
                    qualifiers.push((idx, self.title_weight[idx]));
                } else if pos < PLAY_IN_SEEDS {
                    tally.play_in[idx] += 1;
                    tally.playoffs[idx] += 1;
                    qualifiers.push((idx, self.title_weight[idx] * PLAY_IN_TITLE_WEIGHT));
                }
            }
        }

        let total: f64 = qualifiers.iter().map(|&(_, w)| w).sum();
        if total > 0.0 {
            for (idx, weight) in qualifiers {
                tally.title_share[idx] += weight / total;
            }
        }
    }

    /// Monte Carlo standings projection for both conferences
    pub fn project(&self, plan: &TrialPlan) -> SeasonProjection {
        let teams = self.model.len();
        let stride = Conference::ALL
            .iter()
            .map(|&c| self.model.members(c).len())
            .max()
            .unwrap_or(0);

        info!(
            "Projecting standings: {} trials over {} remaining games",
            plan.simulations,
            self.remaining.len()
        );

        let run = run_trials(
            plan,
            || SeasonTally::new(teams, stride),
            |tally, rng| {
                let mut wins = Vec::with_capacity(teams);
                self.run_trial(tally, rng, &mut wins);
            },
        );

        let n = run.completed.max(1) as f64;
        let tally = &run.tally;
        let standings = ConferencePair::from_fn(|conference| {
            let members = self.model.members(conference);
            let size = members.len();
            self.rank_by(conference, &tally.wins_total)
                .into_iter()
                .enumerate()
                .map(|(pos, idx)| {
                    let projected_wins = tally.wins_total[idx] as f64 / n;
                    let length = self.season_length[idx] as f64;
                    let ranks = &tally.rank_counts[idx * stride..idx * stride + size];
                    StandingsRow {
                        team_id: self.model.team_id(idx),
                        conference,
                        rank: (pos + 1) as u8,
                        projected_wins,
                        projected_losses: (length - projected_wins).max(0.0),
                        win_pct: self.win_pct(idx, projected_wins),
                        playoff_probability: tally.playoffs[idx] as f64 / n,
                        top_six_probability: tally.top_six[idx] as f64 / n,
                        play_in_probability: tally.play_in[idx] as f64 / n,
                        championship_odds: (tally.title_share[idx] / n).clamp(0.0, 1.0),
                        rank_distribution: ranks.iter().map(|&c| c as f64 / n).collect(),
                    }
                })
                .collect()
        });

        SeasonProjection {
            standings,
            simulations_requested: run.requested,
            simulations_used: run.completed,
            complete: run.is_complete(),
        }
    }
}
