//! Single-game win probability and outcome sampling.
//!
//! Ratings are Elo-like: a 400 point edge means 10:1 odds. The home team's
//! rating is raised by its home-court offset before the differential is taken,
//! and every probability is clamped away from 0 and 1 so no game is ever a
//! certain outcome.

use rand::Rng;

use crate::strength::StrengthModel;

/// Rating points per factor of ten in the odds ratio
pub const RATING_SCALE: f64 = 400.0;

/// Logistic slope applied to the rating differential
pub const LOGISTIC_SLOPE: f64 = std::f64::consts::LN_10 / RATING_SCALE;

/// Output probabilities live in [EPSILON, 1 - EPSILON]
pub const PROBABILITY_EPSILON: f64 = 1e-4;

/// Logistic function for probability calculation
#[inline]
fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[inline]
pub fn clamp_probability(p: f64) -> f64 {
    p.clamp(PROBABILITY_EPSILON, 1.0 - PROBABILITY_EPSILON)
}

/// Probability that A beats B in one game.
///
/// `home_advantage` is signed: positive when A hosts (A's offset), negative
/// when B hosts (minus B's offset), zero on a neutral floor.
#[inline]
pub fn win_probability(rating_a: f64, rating_b: f64, home_advantage: f64) -> f64 {
    let differential = (rating_a + home_advantage) - rating_b;
    clamp_probability(logistic(differential * LOGISTIC_SLOPE))
}

/// Draw one Bernoulli trial with success probability `p`
#[inline]
pub fn sample_outcome<R: Rng + ?Sized>(p: f64, rng: &mut R) -> bool {
    rng.gen::<f64>() < p
}

/// Where a game is played, from team A's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Venue {
    HomeA,
    HomeB,
    Neutral,
}

/// Game-level probabilities for teams of one strength model
#[derive(Debug, Clone, Copy)]
pub struct GameOutcomeSampler<'a> {
    model: &'a StrengthModel,
}

impl<'a> GameOutcomeSampler<'a> {
    pub fn new(model: &'a StrengthModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &'a StrengthModel {
        self.model
    }

    /// Probability that team index `a` beats team index `b`
    #[inline]
    pub fn game_probability(&self, a: usize, b: usize, venue: Venue) -> f64 {
        let offset = match venue {
            Venue::HomeA => self.model.home_advantage(a),
            Venue::HomeB => -self.model.home_advantage(b),
            Venue::Neutral => 0.0,
        };
        win_probability(self.model.rating(a), self.model.rating(b), offset)
    }

    /// Sample one game; returns true when `a` wins
    #[inline]
    pub fn sample_game<R: Rng + ?Sized>(
        &self,
        a: usize,
        b: usize,
        venue: Venue,
        rng: &mut R,
    ) -> bool {
        sample_outcome(self.game_probability(a, b, venue), rng)
    }
}
