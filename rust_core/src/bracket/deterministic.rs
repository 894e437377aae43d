//! Most-likely bracket.
//!
//! Walks the stage machine once, resolving each matchup with the exact series
//! prediction and advancing the favorite. No randomness, so identical inputs
//! give identical brackets. Chaining favorites like this is only meant for
//! display; it overstates certainty if read as odds.

use tracing::debug;

use super::topology::{playoff_field, resolve_play_in, BracketStage, ConferenceBracket, Seeding};
use super::{ConferencePlayIn, PlayInGame, PredictedBracket};
use crate::error::{ForecastError, Result};
use crate::models::{Conference, ConferencePair, PlayoffRound, SeriesPrediction};
use crate::series::{validate_best_of, SeriesEvaluator};
use crate::strength::StrengthModel;

/// Exact prediction with `host` holding home court; returns the favorite too
fn decide(
    evaluator: &SeriesEvaluator<'_>,
    round: PlayoffRound,
    host: usize,
    visitor: usize,
    best_of: u8,
) -> (SeriesPrediction, usize) {
    let prediction = evaluator.forecast(host, visitor, best_of, host, round).prediction;
    let winner = if prediction.predicted_winner == prediction.team_a {
        host
    } else {
        visitor
    };
    (prediction, winner)
}

pub fn predict_bracket(
    model: &StrengthModel,
    seeding: &Seeding,
    include_play_in: bool,
    best_of: u8,
) -> Result<PredictedBracket> {
    validate_best_of(best_of)?;
    seeding.validate(model)?;

    let evaluator = SeriesEvaluator::new(model);
    let play_in_length = PlayoffRound::PlayIn.default_best_of();

    let mut play_in: ConferencePair<Option<ConferencePlayIn>> = ConferencePair::default();
    let mut play_in_seeds: ConferencePair<Option<(usize, usize)>> = ConferencePair::default();
    let mut brackets: Option<ConferencePair<ConferenceBracket>> = None;
    let mut first_round = Vec::new();
    let mut conference_semifinals = Vec::new();
    let mut conference_finals = Vec::new();
    let mut finals = None;

    let mut stage = BracketStage::initial(seeding.any_play_in(include_play_in));
    while let Some(round) = stage.round() {
        match stage {
            BracketStage::PlayIn => {
                for conference in Conference::ALL {
                    if !seeding.play_in_active(conference, include_play_in) {
                        continue;
                    }
                    let mut games = Vec::with_capacity(3);
                    let (seventh, eighth) =
                        resolve_play_in(seeding.seeds(conference), |slot, host, visitor| {
                            let (prediction, winner) =
                                decide(&evaluator, round, host, visitor, play_in_length);
                            games.push(PlayInGame { slot, prediction });
                            winner
                        });
                    *play_in_seeds.get_mut(conference) = Some((seventh, eighth));
                    *play_in.get_mut(conference) = Some(ConferencePlayIn {
                        games,
                        seventh_seed: model.team_id(seventh),
                        eighth_seed: model.team_id(eighth),
                    });
                }
            }
            BracketStage::NbaFinals => {
                let (east, west) = match &brackets {
                    Some(b) => (b.eastern.champion(), b.western.champion()),
                    None => (None, None),
                };
                let (east, west) = east
                    .zip(west)
                    .ok_or_else(|| ForecastError::invalid("conference brackets did not resolve"))?;
                let host = seeding.finals_host(model, east, west);
                let visitor = if host == east { west } else { east };
                finals = Some(decide(&evaluator, round, host, visitor, best_of));
            }
            _ => {
                let brackets = brackets.get_or_insert_with(|| {
                    ConferencePair::from_fn(|c| {
                        ConferenceBracket::new(playoff_field(
                            seeding.seeds(c),
                            *play_in_seeds.get(c),
                        ))
                    })
                });
                let target = match round {
                    PlayoffRound::FirstRound => &mut first_round,
                    PlayoffRound::ConferenceSemifinals => &mut conference_semifinals,
                    _ => &mut conference_finals,
                };
                for conference in Conference::ALL {
                    brackets.get_mut(conference).play_round(|host, visitor| {
                        let (prediction, winner) =
                            decide(&evaluator, round, host, visitor, best_of);
                        target.push(prediction);
                        winner
                    });
                }
            }
        }
        stage = stage.next();
    }

    let (nba_finals, champion) =
        finals.ok_or_else(|| ForecastError::invalid("bracket has no finals"))?;
    debug!("Predicted bracket resolved: champion {}", model.team_id(champion));

    Ok(PredictedBracket {
        seeding: seeding.team_ids(model),
        play_in,
        first_round,
        conference_semifinals,
        conference_finals,
        nba_finals,
        champion: model.team_id(champion),
    })
}
