//! Stochastic tournament simulation.
//!
//! Every trial plays the whole postseason game by game: play-in games are
//! single draws, series are played out with the 2-2-1-1-1 home pattern. When
//! standings are not fixed, each trial first samples the rest of the regular
//! season and seeds from that, so seeding uncertainty reaches the odds.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::topology::{
    playoff_field, resolve_play_in, BracketStage, ConferenceBracket, Seeding, PLAYOFF_SEEDS,
    PLAY_IN_SEEDS,
};
use crate::error::{ForecastError, Result};
use crate::models::{Conference, ConferencePair, PlayoffRound, RoundOdds, TeamId, TeamProbability};
use crate::montecarlo::{run_trials, Tally, TrialPlan};
use crate::season::SeasonProjector;
use crate::series::{validate_best_of, SeriesEvaluator};
use crate::strength::StrengthModel;

const REACH_PLAY_IN: usize = 0;
const REACH_PLAYOFFS: usize = 1;
const REACH_SEMIFINALS: usize = 2;
const REACH_CONFERENCE_FINALS: usize = 3;
const REACH_FINALS: usize = 4;
const REACH_CHAMPION: usize = 5;
const REACH_STAGES: usize = 6;

/// Where each trial's seeding comes from
#[derive(Debug, Clone, Copy)]
pub enum TournamentSeeding<'a> {
    /// Standings supplied by the caller or already projected
    Fixed(&'a Seeding),
    /// Sample the remaining season inside every trial
    Projected(&'a SeasonProjector<'a>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalsMatchup {
    pub eastern: TeamId,
    pub western: TeamId,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentSummary {
    pub generated_at: DateTime<Utc>,
    pub simulations_requested: u32,
    pub simulations_used: u32,
    pub complete: bool,
    /// Every team, most likely champion first; sums to 1
    pub champion_probabilities: Vec<TeamProbability>,
    pub round_advancement: Vec<RoundOdds>,
    pub most_likely_champion: Option<TeamProbability>,
    pub most_likely_finals: Option<FinalsMatchup>,
}

impl TournamentSummary {
    pub fn team_odds(&self, team_id: TeamId) -> Option<&RoundOdds> {
        self.round_advancement.iter().find(|r| r.team_id == team_id)
    }

    pub fn championship_probability(&self, team_id: TeamId) -> Option<f64> {
        self.champion_probabilities
            .iter()
            .find(|p| p.team_id == team_id)
            .map(|p| p.probability)
    }

    /// Probability of winning the conference, best first
    pub fn conference_odds(&self, conference: Conference) -> Vec<TeamProbability> {
        let mut odds: Vec<TeamProbability> = self
            .round_advancement
            .iter()
            .filter(|r| r.conference == conference)
            .map(|r| TeamProbability {
                team_id: r.team_id,
                conference: r.conference,
                probability: r.nba_finals,
            })
            .collect();
        sort_probabilities(&mut odds);
        odds
    }

    /// Binomial standard error of a team's title probability
    pub fn championship_standard_error(&self, team_id: TeamId) -> Option<f64> {
        let p = self.championship_probability(team_id)?;
        let n = self.simulations_used.max(1) as f64;
        Some((p * (1.0 - p) / n).sqrt())
    }
}

fn sort_probabilities(list: &mut [TeamProbability]) {
    list.sort_by(|a, b| {
        b.probability
            .total_cmp(&a.probability)
            .then(a.team_id.cmp(&b.team_id))
    });
}

#[derive(Debug, Clone)]
struct TournamentTally {
    /// team * REACH_STAGES + stage
    reach: Vec<u32>,
    /// (eastern champion, western champion) -> trials
    finals: FxHashMap<(usize, usize), u32>,
}

impl TournamentTally {
    fn new(teams: usize) -> Self {
        Self {
            reach: vec![0; teams * REACH_STAGES],
            finals: FxHashMap::default(),
        }
    }

    #[inline]
    fn mark(&mut self, team: usize, stage: usize) {
        self.reach[team * REACH_STAGES + stage] += 1;
    }
}

impl Tally for TournamentTally {
    fn merge(&mut self, other: Self) {
        for (a, b) in self.reach.iter_mut().zip(&other.reach) {
            *a += *b;
        }
        for (matchup, count) in other.finals {
            *self.finals.entry(matchup).or_insert(0) += count;
        }
    }
}

pub struct TournamentSimulator<'a> {
    model: &'a StrengthModel,
    evaluator: SeriesEvaluator<'a>,
    seeding: TournamentSeeding<'a>,
    include_play_in: bool,
    best_of: u8,
}

impl<'a> TournamentSimulator<'a> {
    pub fn new(
        model: &'a StrengthModel,
        seeding: TournamentSeeding<'a>,
        include_play_in: bool,
        best_of: u8,
    ) -> Result<Self> {
        validate_best_of(best_of)?;
        match seeding {
            TournamentSeeding::Fixed(fixed) => fixed.validate(model)?,
            TournamentSeeding::Projected(_) => {
                for conference in Conference::ALL {
                    let size = model.members(conference).len();
                    if size < PLAYOFF_SEEDS {
                        return Err(ForecastError::invalid(format!(
                            "{} conference has {} teams, a bracket needs {}",
                            conference, size, PLAYOFF_SEEDS
                        )));
                    }
                }
            }
        }

        Ok(Self {
            model,
            evaluator: SeriesEvaluator::new(model),
            seeding,
            include_play_in,
            best_of,
        })
    }

    fn run_trial(&self, tally: &mut TournamentTally, rng: &mut StdRng) {
        let sampled;
        let seeding = match self.seeding {
            TournamentSeeding::Fixed(fixed) => fixed,
            TournamentSeeding::Projected(projector) => {
                sampled = projector.sample_seeding(rng);
                &sampled
            }
        };

        let evaluator = &self.evaluator;
        let best_of = self.best_of;
        let play_in_length = PlayoffRound::PlayIn.default_best_of();

        let mut play_in_seeds: ConferencePair<Option<(usize, usize)>> = ConferencePair::default();
        let mut brackets: Option<ConferencePair<ConferenceBracket>> = None;

        let mut stage = BracketStage::initial(seeding.any_play_in(self.include_play_in));
        while let Some(round) = stage.round() {
            match stage {
                BracketStage::PlayIn => {
                    for conference in Conference::ALL {
                        if !seeding.play_in_active(conference, self.include_play_in) {
                            continue;
                        }
                        let seeds = seeding.seeds(conference);
                        for &team in &seeds[6..PLAY_IN_SEEDS] {
                            tally.mark(team, REACH_PLAY_IN);
                        }
                        let result = resolve_play_in(seeds, |_, host, visitor| {
                            evaluator.simulate(host, visitor, play_in_length, host, rng).0
                        });
                        *play_in_seeds.get_mut(conference) = Some(result);
                    }
                }
                BracketStage::NbaFinals => {
                    let Some(b) = &brackets else { break };
                    let (Some(east), Some(west)) = (b.eastern.champion(), b.western.champion())
                    else {
                        break;
                    };
                    let host = seeding.finals_host(self.model, east, west);
                    let visitor = if host == east { west } else { east };
                    let (champion, _) = evaluator.simulate(host, visitor, best_of, host, rng);
                    tally.mark(champion, REACH_CHAMPION);
                    *tally.finals.entry((east, west)).or_insert(0) += 1;
                }
                _ => {
                    let brackets = brackets.get_or_insert_with(|| {
                        ConferencePair::from_fn(|c| {
                            let field = playoff_field(seeding.seeds(c), *play_in_seeds.get(c));
                            for &team in &field {
                                tally.mark(team, REACH_PLAYOFFS);
                            }
                            ConferenceBracket::new(field)
                        })
                    });
                    let reached = match round {
                        PlayoffRound::FirstRound => REACH_SEMIFINALS,
                        PlayoffRound::ConferenceSemifinals => REACH_CONFERENCE_FINALS,
                        _ => REACH_FINALS,
                    };
                    for conference in Conference::ALL {
                        let bracket = brackets.get_mut(conference);
                        bracket.play_round(|host, visitor| {
                            evaluator.simulate(host, visitor, best_of, host, rng).0
                        });
                        for team in bracket.survivors() {
                            tally.mark(team, reached);
                        }
                    }
                }
            }
            stage = stage.next();
        }
    }

    pub fn simulate(&self, plan: &TrialPlan) -> TournamentSummary {
        let teams = self.model.len();
        info!(
            "Simulating tournament: {} trials, play-in {}, {} seeding",
            plan.simulations,
            self.include_play_in,
            match self.seeding {
                TournamentSeeding::Fixed(_) => "fixed",
                TournamentSeeding::Projected(_) => "projected",
            }
        );

        let run = run_trials(
            plan,
            || TournamentTally::new(teams),
            |tally, rng| self.run_trial(tally, rng),
        );

        let n = run.completed.max(1) as f64;
        let reach = |team: usize, stage: usize| {
            run.tally.reach[team * REACH_STAGES + stage] as f64 / n
        };

        let round_advancement: Vec<RoundOdds> = (0..teams)
            .map(|idx| RoundOdds {
                team_id: self.model.team_id(idx),
                conference: self.model.conference(idx),
                play_in: reach(idx, REACH_PLAY_IN),
                make_playoffs: reach(idx, REACH_PLAYOFFS),
                conference_semifinals: reach(idx, REACH_SEMIFINALS),
                conference_finals: reach(idx, REACH_CONFERENCE_FINALS),
                nba_finals: reach(idx, REACH_FINALS),
                championship: reach(idx, REACH_CHAMPION),
            })
            .collect();

        let mut champion_probabilities: Vec<TeamProbability> = round_advancement
            .iter()
            .map(|r| TeamProbability {
                team_id: r.team_id,
                conference: r.conference,
                probability: r.championship,
            })
            .collect();
        sort_probabilities(&mut champion_probabilities);

        let most_likely_champion = champion_probabilities
            .first()
            .filter(|p| p.probability > 0.0)
            .cloned();

        let most_likely_finals = run
            .tally
            .finals
            .iter()
            .map(|(&(east, west), &count)| {
                (self.model.team_id(east), self.model.team_id(west), count)
            })
            .max_by(|a, b| a.2.cmp(&b.2).then_with(|| (b.0, b.1).cmp(&(a.0, a.1))))
            .map(|(eastern, western, count)| FinalsMatchup {
                eastern,
                western,
                probability: count as f64 / n,
            });

        TournamentSummary {
            generated_at: Utc::now(),
            simulations_requested: run.requested,
            simulations_used: run.completed,
            complete: run.is_complete(),
            champion_probabilities,
            round_advancement,
            most_likely_champion,
            most_likely_finals,
        }
    }
}
