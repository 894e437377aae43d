//! Fixed NBA postseason topology.
//!
//! Seeds are 0-based positions in a conference's ranking. Seeds 1-6 qualify
//! directly, 7-10 enter the play-in, and the eight survivors are paired
//! 1v8, 4v5, 3v6, 2v7 with adjacent winners meeting in the next round. The
//! better seed always hosts inside a conference.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::models::{Conference, ConferencePair, PlayoffRound, TeamId};
use crate::strength::StrengthModel;

/// Seeds 1-6: automatic playoff berth
pub const AUTO_BID_SEEDS: usize = 6;
pub const PLAYOFF_SEEDS: usize = 8;
/// Seeds 7-10 contest the play-in
pub const PLAY_IN_SEEDS: usize = 10;

/// First-round seed positions in bracket order
pub const BRACKET_ORDER: [usize; PLAYOFF_SEEDS] = [0, 7, 3, 4, 2, 5, 1, 6];

/// Rounds of the bracket as a linear state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BracketStage {
    PlayIn,
    FirstRound,
    ConferenceSemifinals,
    ConferenceFinals,
    NbaFinals,
    Champion,
}

impl BracketStage {
    pub fn next(self) -> BracketStage {
        match self {
            BracketStage::PlayIn => BracketStage::FirstRound,
            BracketStage::FirstRound => BracketStage::ConferenceSemifinals,
            BracketStage::ConferenceSemifinals => BracketStage::ConferenceFinals,
            BracketStage::ConferenceFinals => BracketStage::NbaFinals,
            BracketStage::NbaFinals | BracketStage::Champion => BracketStage::Champion,
        }
    }

    /// The round played at this stage; `None` once a champion exists
    pub fn round(self) -> Option<PlayoffRound> {
        match self {
            BracketStage::PlayIn => Some(PlayoffRound::PlayIn),
            BracketStage::FirstRound => Some(PlayoffRound::FirstRound),
            BracketStage::ConferenceSemifinals => Some(PlayoffRound::ConferenceSemifinals),
            BracketStage::ConferenceFinals => Some(PlayoffRound::ConferenceFinals),
            BracketStage::NbaFinals => Some(PlayoffRound::NbaFinals),
            BracketStage::Champion => None,
        }
    }

    /// Where a bracket starts; the play-in is absorbed when no conference needs it
    pub fn initial(play_in: bool) -> BracketStage {
        if play_in {
            BracketStage::PlayIn
        } else {
            BracketStage::FirstRound
        }
    }
}

/// The three play-in games of one conference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayInSlot {
    /// 7 hosts 8; winner is the 7 seed
    SevenEight,
    /// 9 hosts 10; loser is eliminated
    NineTen,
    /// Loser of 7v8 hosts winner of 9v10; winner is the 8 seed
    EighthSeed,
}

/// Run the play-in over ranked `seeds` (at least ten).
///
/// `play(slot, host, visitor)` returns the winning team. Returns the final
/// (7 seed, 8 seed).
pub fn resolve_play_in<F>(seeds: &[usize], mut play: F) -> (usize, usize)
where
    F: FnMut(PlayInSlot, usize, usize) -> usize,
{
    let (seven, eight) = (seeds[6], seeds[7]);
    let (nine, ten) = (seeds[8], seeds[9]);

    let top_winner = play(PlayInSlot::SevenEight, seven, eight);
    let top_loser = if top_winner == seven { eight } else { seven };
    let bottom_winner = play(PlayInSlot::NineTen, nine, ten);
    let last_in = play(PlayInSlot::EighthSeed, top_loser, bottom_winner);

    (top_winner, last_in)
}

/// The eight playoff teams of a conference in seed order
pub fn playoff_field(seeds: &[usize], play_in: Option<(usize, usize)>) -> [usize; PLAYOFF_SEEDS] {
    let mut field = [0usize; PLAYOFF_SEEDS];
    field[..AUTO_BID_SEEDS].copy_from_slice(&seeds[..AUTO_BID_SEEDS]);
    let (seventh, eighth) = play_in.unwrap_or((seeds[6], seeds[7]));
    field[6] = seventh;
    field[7] = eighth;
    field
}

/// One conference's eight-team bracket
#[derive(Debug, Clone)]
pub struct ConferenceBracket {
    field: [usize; PLAYOFF_SEEDS],
    /// Surviving seed positions, in bracket order
    alive: Vec<usize>,
}

impl ConferenceBracket {
    pub fn new(field: [usize; PLAYOFF_SEEDS]) -> Self {
        Self {
            field,
            alive: BRACKET_ORDER.to_vec(),
        }
    }

    /// Play one round. `play(host, visitor)` returns the winning team.
    pub fn play_round<F>(&mut self, mut play: F)
    where
        F: FnMut(usize, usize) -> usize,
    {
        let field = self.field;
        let next: Vec<usize> = self
            .alive
            .chunks(2)
            .map(|pair| {
                let (high, low) = if pair[0] < pair[1] {
                    (pair[0], pair[1])
                } else {
                    (pair[1], pair[0])
                };
                if play(field[high], field[low]) == field[high] {
                    high
                } else {
                    low
                }
            })
            .collect();
        self.alive = next;
    }

    /// Teams still alive
    pub fn survivors(&self) -> impl Iterator<Item = usize> + '_ {
        self.alive.iter().map(move |&seed| self.field[seed])
    }

    pub fn champion(&self) -> Option<usize> {
        match self.alive.as_slice() {
            [seed] => Some(self.field[*seed]),
            _ => None,
        }
    }
}

/// Supplied standings: team ids per conference, best seed first
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeedingInput {
    pub eastern: Vec<TeamId>,
    pub western: Vec<TeamId>,
}

/// Resolved seeding over model indices
#[derive(Debug, Clone, PartialEq)]
pub struct Seeding {
    pub conferences: ConferencePair<Vec<usize>>,
    /// Finals home-court priority per team index (higher hosts)
    pub finals_priority: Vec<f64>,
}

impl Seeding {
    /// Resolve supplied standings. Better seeds get higher finals priority.
    pub fn from_input(model: &StrengthModel, input: &SeedingInput) -> Result<Self> {
        let resolve = |ids: &[TeamId]| -> Result<Vec<usize>> {
            ids.iter().map(|&id| model.require(id)).collect()
        };
        let conferences = ConferencePair::new(resolve(&input.eastern)?, resolve(&input.western)?);

        let mut finals_priority = vec![f64::NEG_INFINITY; model.len()];
        for conference in Conference::ALL {
            let seeds = conferences.get(conference);
            for (pos, &idx) in seeds.iter().enumerate() {
                finals_priority[idx] = (seeds.len() - pos) as f64;
            }
        }

        let seeding = Self {
            conferences,
            finals_priority,
        };
        seeding.validate(model)?;
        Ok(seeding)
    }

    pub fn validate(&self, model: &StrengthModel) -> Result<()> {
        if self.finals_priority.len() != model.len() {
            return Err(ForecastError::invalid("seeding does not cover the roster"));
        }

        let mut seen = FxHashSet::default();
        for conference in Conference::ALL {
            let seeds = self.conferences.get(conference);
            if seeds.len() < PLAYOFF_SEEDS {
                return Err(ForecastError::invalid(format!(
                    "{} standings need at least {} teams, got {}",
                    conference,
                    PLAYOFF_SEEDS,
                    seeds.len()
                )));
            }
            for &idx in seeds {
                if idx >= model.len() {
                    return Err(ForecastError::invalid("seeding references an unknown team"));
                }
                if model.conference(idx) != conference {
                    return Err(ForecastError::invalid(format!(
                        "team {} is not in the {} conference",
                        model.team_id(idx),
                        conference
                    )));
                }
                if !seen.insert(idx) {
                    return Err(ForecastError::invalid(format!(
                        "team {} is seeded more than once",
                        model.team_id(idx)
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn seeds(&self, conference: Conference) -> &[usize] {
        self.conferences.get(conference)
    }

    pub fn play_in_active(&self, conference: Conference, include_play_in: bool) -> bool {
        include_play_in && self.seeds(conference).len() >= PLAY_IN_SEEDS
    }

    pub fn any_play_in(&self, include_play_in: bool) -> bool {
        Conference::ALL
            .iter()
            .any(|&c| self.play_in_active(c, include_play_in))
    }

    /// Home court in the finals: better record, then rating, then lower id
    pub fn finals_host(&self, model: &StrengthModel, a: usize, b: usize) -> usize {
        let by_record = self.finals_priority[a].total_cmp(&self.finals_priority[b]);
        let by_rating = model.rating(a).total_cmp(&model.rating(b));
        let by_id = model.team_id(b).cmp(&model.team_id(a));
        if by_record.then(by_rating).then(by_id).is_ge() {
            a
        } else {
            b
        }
    }

    pub fn team_ids(&self, model: &StrengthModel) -> ConferencePair<Vec<TeamId>> {
        self.conferences
            .clone()
            .map(|_, seeds| seeds.into_iter().map(|i| model.team_id(i)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::league;

    #[test]
    fn test_stage_machine_walks_to_champion() {
        let mut stage = BracketStage::initial(true);
        let mut rounds = Vec::new();
        while let Some(round) = stage.round() {
            rounds.push(round);
            stage = stage.next();
        }
        assert_eq!(
            rounds,
            vec![
                PlayoffRound::PlayIn,
                PlayoffRound::FirstRound,
                PlayoffRound::ConferenceSemifinals,
                PlayoffRound::ConferenceFinals,
                PlayoffRound::NbaFinals,
            ]
        );
        assert_eq!(stage.next(), BracketStage::Champion);
        assert_eq!(BracketStage::initial(false), BracketStage::FirstRound);
    }

    #[test]
    fn test_play_in_topology() {
        let seeds: Vec<usize> = (100..110).collect();
        let mut games = Vec::new();
        // Visitor wins every game
        let (seventh, eighth) = resolve_play_in(&seeds, |slot, host, visitor| {
            games.push((slot, host, visitor));
            visitor
        });

        assert_eq!(
            games,
            vec![
                (PlayInSlot::SevenEight, 106, 107),
                (PlayInSlot::NineTen, 108, 109),
                (PlayInSlot::EighthSeed, 106, 109),
            ]
        );
        assert_eq!((seventh, eighth), (107, 109));

        let field = playoff_field(&seeds, Some((seventh, eighth)));
        let mut sorted = field.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), PLAYOFF_SEEDS);
    }

    #[test]
    fn test_first_round_pairs_and_hosts() {
        let field = [10, 11, 12, 13, 14, 15, 16, 17];
        let mut bracket = ConferenceBracket::new(field);
        let mut pairs = Vec::new();
        bracket.play_round(|host, visitor| {
            pairs.push((host, visitor));
            host
        });
        assert_eq!(pairs, vec![(10, 17), (13, 14), (12, 15), (11, 16)]);

        // Upset in the 4v5 slot: 5 seed visits the 1 seed next
        let mut semis = Vec::new();
        let mut bracket = ConferenceBracket::new(field);
        bracket.play_round(|host, visitor| if host == 13 { visitor } else { host });
        bracket.play_round(|host, visitor| {
            semis.push((host, visitor));
            host
        });
        assert_eq!(semis, vec![(10, 14), (11, 12)]);

        bracket.play_round(|host, _| host);
        assert_eq!(bracket.champion(), Some(10));
    }

    #[test]
    fn test_seeding_validation() {
        let model = league(10, |_| 1500.0);
        let east: Vec<TeamId> = model
            .members(Conference::Eastern)
            .iter()
            .map(|&i| model.team_id(i))
            .collect();
        let west: Vec<TeamId> = model
            .members(Conference::Western)
            .iter()
            .map(|&i| model.team_id(i))
            .collect();

        let ok = Seeding::from_input(
            &model,
            &SeedingInput {
                eastern: east.clone(),
                western: west.clone(),
            },
        );
        assert!(ok.is_ok());

        let mut dup = east.clone();
        dup[1] = dup[0];
        assert!(matches!(
            Seeding::from_input(&model, &SeedingInput { eastern: dup, western: west.clone() }),
            Err(ForecastError::InvalidInput(_))
        ));

        assert!(matches!(
            Seeding::from_input(
                &model,
                &SeedingInput {
                    eastern: west.clone(),
                    western: east.clone()
                }
            ),
            Err(ForecastError::InvalidInput(_))
        ));

        let mut unknown = east.clone();
        unknown[0] = TeamId(9);
        assert!(matches!(
            Seeding::from_input(&model, &SeedingInput { eastern: unknown, western: west.clone() }),
            Err(ForecastError::NotFound(TeamId(9)))
        ));

        assert!(Seeding::from_input(
            &model,
            &SeedingInput {
                eastern: east[..7].to_vec(),
                western: west
            }
        )
        .is_err());
    }

    #[test]
    fn test_play_in_absorbed_for_short_conferences() {
        let model = league(8, |_| 1500.0);
        let seeding = Seeding {
            conferences: ConferencePair::from_fn(|c| model.members(c).to_vec()),
            finals_priority: vec![0.0; model.len()],
        };
        assert!(seeding.validate(&model).is_ok());
        assert!(!seeding.any_play_in(true));
        assert_eq!(BracketStage::initial(seeding.any_play_in(true)), BracketStage::FirstRound);
    }

    #[test]
    fn test_finals_host_order() {
        let model = league(8, |i| 1500.0 + i as f64);
        let east = model.members(Conference::Eastern)[0];
        let west = model.members(Conference::Western)[0];
        let mut seeding = Seeding {
            conferences: ConferencePair::from_fn(|c| model.members(c).to_vec()),
            finals_priority: vec![0.5; model.len()],
        };

        // Equal records: higher rating hosts
        let stronger = if model.rating(east) > model.rating(west) { east } else { west };
        assert_eq!(seeding.finals_host(&model, east, west), stronger);

        // Better record beats rating
        let weaker = if stronger == east { west } else { east };
        seeding.finals_priority[weaker] = 0.9;
        assert_eq!(seeding.finals_host(&model, east, west), weaker);
        assert_eq!(seeding.finals_host(&model, west, east), weaker);
    }
}
