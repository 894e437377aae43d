//! Best-of-N series evaluation.
//!
//! Two paths:
//! - `evaluate` enumerates every reachable (wins A, wins B) state exactly.
//!   Deterministic and variance-free; at most (need+1)^2 states, so cheap
//!   even for best-of-9. Used for predictions and the display bracket.
//! - `simulate` plays the series game by game with sampled outcomes. Used by
//!   tournament trials, where every game must be drawn.
//!
//! Home court follows the 2-2-1-1-1 template: games 1-2 at the home-court
//! team, 3-4 away, then alternating.

use rand::Rng;

use crate::error::{ForecastError, Result};
use crate::models::{GameBreakdown, PlayoffRound, SeriesForecast, SeriesOutcome, SeriesPrediction};
use crate::strength::StrengthModel;
use crate::win_prob::{GameOutcomeSampler, Venue};

pub const MAX_SERIES_LENGTH: u8 = 9;

/// Wins required to take a best-of-N series
#[inline]
pub fn wins_needed(best_of: u8) -> u8 {
    best_of / 2 + 1
}

pub fn validate_best_of(best_of: u8) -> Result<()> {
    if best_of == 0 || best_of % 2 == 0 || best_of > MAX_SERIES_LENGTH {
        return Err(ForecastError::invalid(format!(
            "series length must be an odd number between 1 and {}, got {}",
            MAX_SERIES_LENGTH, best_of
        )));
    }
    Ok(())
}

/// Whether the home-court team hosts game `game_index` (0-based)
#[inline]
pub fn home_court_hosts(game_index: u8) -> bool {
    match game_index {
        0 | 1 => true,
        2 | 3 => false,
        g => g % 2 == 0,
    }
}

/// Exact result distribution of one series
#[derive(Debug, Clone)]
struct SeriesDistribution {
    win_probability_a: f64,
    expected_games: f64,
    /// (a won, games played, probability)
    outcomes: Vec<(bool, u8, f64)>,
    /// (a hosts, single-game p(a), probability the game is played)
    games: Vec<(bool, f64, f64)>,
}

#[derive(Debug, Clone, Copy)]
pub struct SeriesEvaluator<'a> {
    sampler: GameOutcomeSampler<'a>,
}

impl<'a> SeriesEvaluator<'a> {
    pub fn new(model: &'a StrengthModel) -> Self {
        Self {
            sampler: GameOutcomeSampler::new(model),
        }
    }

    #[inline]
    fn venue(a: usize, home_court: usize, game_index: u8) -> Venue {
        let home_court_is_a = home_court == a;
        match (home_court_hosts(game_index), home_court_is_a) {
            (true, true) | (false, false) => Venue::HomeA,
            _ => Venue::HomeB,
        }
    }

    fn distribution(
        &self,
        a: usize,
        b: usize,
        best_of: u8,
        home_court: usize,
    ) -> SeriesDistribution {
        let need = wins_needed(best_of) as usize;
        let mut state = vec![vec![0.0_f64; need + 1]; need + 1];
        state[0][0] = 1.0;

        let mut games = Vec::with_capacity(best_of as usize);
        for g in 0..best_of {
            let venue = Self::venue(a, home_court, g);
            let p = self.sampler.game_probability(a, b, venue);
            let mut played = 0.0;

            let total = g as usize;
            for a_wins in 0..need.min(total + 1) {
                let b_wins = total - a_wins;
                if b_wins >= need {
                    continue;
                }
                let reach = state[a_wins][b_wins];
                if reach == 0.0 {
                    continue;
                }
                played += reach;
                state[a_wins + 1][b_wins] += reach * p;
                state[a_wins][b_wins + 1] += reach * (1.0 - p);
            }

            games.push((venue == Venue::HomeA, p, played));
        }

        let mut outcomes = Vec::with_capacity(2 * need);
        let mut win_probability_a = 0.0;
        let mut expected_games = 0.0;
        for losses in 0..need {
            let length = (need + losses) as u8;
            let a_in = state[need][losses];
            let b_in = state[losses][need];
            win_probability_a += a_in;
            expected_games += (a_in + b_in) * length as f64;
            outcomes.push((true, length, a_in));
            outcomes.push((false, length, b_in));
        }

        SeriesDistribution {
            win_probability_a,
            expected_games,
            outcomes,
            games,
        }
    }

    /// Exact prediction for `a` vs `b`; `home_court` must be one of them
    pub fn evaluate(
        &self,
        a: usize,
        b: usize,
        best_of: u8,
        home_court: usize,
        round: PlayoffRound,
    ) -> Result<SeriesForecast> {
        validate_best_of(best_of)?;
        if a == b {
            return Err(ForecastError::invalid("a team cannot play itself"));
        }
        if home_court != a && home_court != b {
            return Err(ForecastError::invalid(
                "home court must belong to one of the two teams",
            ));
        }
        Ok(self.forecast(a, b, best_of, home_court, round))
    }

    /// `evaluate` for matchups the bracket has already validated
    pub(crate) fn forecast(
        &self,
        a: usize,
        b: usize,
        best_of: u8,
        home_court: usize,
        round: PlayoffRound,
    ) -> SeriesForecast {
        let model = self.sampler.model();
        let dist = self.distribution(a, b, best_of, home_court);
        let team_a = model.team_id(a);
        let team_b = model.team_id(b);
        let home_court_team = model.team_id(home_court);

        let win_probability_a = dist.win_probability_a.clamp(0.0, 1.0);
        let win_probability_b = 1.0 - win_probability_a;
        let predicted_winner = if win_probability_a > win_probability_b {
            team_a
        } else if win_probability_b > win_probability_a {
            team_b
        } else {
            home_court_team
        };

        let need = wins_needed(best_of);
        let predicted_game_count = (dist.expected_games.round() as u8).clamp(need, best_of);

        let prediction = SeriesPrediction {
            team_a,
            team_b,
            round,
            best_of,
            home_court_team,
            win_probability_a,
            win_probability_b,
            predicted_winner,
            predicted_game_count,
            expected_games: dist.expected_games,
            confidence: win_probability_a.max(win_probability_b),
        };

        let game_breakdown = dist
            .games
            .iter()
            .enumerate()
            .map(|(i, &(a_hosts, p, played))| GameBreakdown {
                game_number: i as u8 + 1,
                home_team: if a_hosts { team_a } else { team_b },
                win_probability_a: p,
                probability_played: played,
            })
            .collect();

        let outcomes = dist
            .outcomes
            .iter()
            .map(|&(a_won, games, probability)| SeriesOutcome {
                winner: if a_won { team_a } else { team_b },
                games,
                probability,
            })
            .collect();

        SeriesForecast {
            prediction,
            game_breakdown,
            outcomes,
        }
    }

    /// Play one series game by game. Returns (winner index, games played).
    ///
    /// Callers validate `best_of`; trials run millions of series.
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        a: usize,
        b: usize,
        best_of: u8,
        home_court: usize,
        rng: &mut R,
    ) -> (usize, u8) {
        let need = wins_needed(best_of);
        let (mut a_wins, mut b_wins) = (0u8, 0u8);
        let mut game = 0u8;

        while a_wins < need && b_wins < need {
            let venue = Self::venue(a, home_court, game);
            if self.sampler.sample_game(a, b, venue, rng) {
                a_wins += 1;
            } else {
                b_wins += 1;
            }
            game += 1;
        }

        if a_wins == need {
            (a, game)
        } else {
            (b, game)
        }
    }
}
