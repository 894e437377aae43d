//! Playoff Engine Integration Tests
//!
//! Exercises every engine operation end to end over an in-memory 30-team
//! league: standings projection, display bracket, championship odds, series
//! prediction, tournament simulation and per-team odds.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use playoff_rust_core::{
    Conference, ConferenceFilter, EngineConfig, ForecastError, JsonFileSource, LeagueSnapshot,
    PlayoffEngine, PlayoffRound, RunOptions, ScheduleEntry, SeedingInput, StaticLeagueSource,
    TeamId, TeamRating, TeamRecord, TournamentRequest,
};

const FIRST_TEAM_ID: u32 = 1_610_612_737;

fn team_id(i: usize) -> TeamId {
    TeamId(FIRST_TEAM_ID + i as u32)
}

/// `per_conference` teams a side; Eastern teams first
fn ratings(per_conference: usize, rating: impl Fn(usize) -> f64, home: f64) -> Vec<TeamRating> {
    (0..2 * per_conference)
        .map(|i| TeamRating {
            team_id: team_id(i),
            conference: if i < per_conference {
                Conference::Eastern
            } else {
                Conference::Western
            },
            rating: rating(i),
            home_advantage: home,
        })
        .collect()
}

/// Every pair meets `meetings` times, alternating hosts
fn schedule(teams: usize, meetings: usize) -> Vec<ScheduleEntry> {
    let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
    let mut games = Vec::new();
    for m in 0..meetings {
        for i in 0..teams {
            for j in (i + 1)..teams {
                let (home, away) = if m % 2 == 0 { (i, j) } else { (j, i) };
                games.push(ScheduleEntry {
                    home_team_id: team_id(home),
                    away_team_id: team_id(away),
                    date,
                });
            }
        }
    }
    games
}

/// 30-team league partway through the season
fn nba_snapshot() -> LeagueSnapshot {
    let ratings = ratings(15, |i| 1380.0 + ((i * 41) % 29) as f64 * 9.0, 35.0);
    let records = (0..30)
        .map(|i| TeamRecord {
            team_id: team_id(i),
            wins: 10 + ((i * 7) % 21) as u16,
            losses: 30 - ((i * 7) % 21) as u16,
        })
        .collect();
    LeagueSnapshot {
        season: "2024-25".to_string(),
        ratings,
        records: Some(records),
        schedule: schedule(30, 1),
    }
}

fn engine_with(snapshot: LeagueSnapshot, config: EngineConfig) -> PlayoffEngine {
    PlayoffEngine::new(Arc::new(StaticLeagueSource::new(snapshot)), config).unwrap()
}

fn engine(snapshot: LeagueSnapshot) -> PlayoffEngine {
    engine_with(snapshot, EngineConfig::default())
}

fn seeded(seed: u64) -> RunOptions {
    RunOptions {
        seed: Some(seed),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_conference_standings_invariants() {
    let snapshot = nba_snapshot();
    let engine = engine(snapshot.clone());
    let report = engine
        .get_conference_standings(ConferenceFilter::Both, 500, &seeded(1))
        .await
        .unwrap();

    assert_eq!(report.season, "2024-25");
    assert_eq!(report.simulations_used, 500);
    assert!(report.complete);
    assert_eq!(report.standings.len(), 2);

    for conference in &report.standings {
        let mut ranks: Vec<u8> = conference.rows.iter().map(|r| r.rank).collect();
        ranks.sort_unstable();
        assert_eq!(ranks, (1..=15).collect::<Vec<u8>>());

        for row in &conference.rows {
            assert_eq!(row.conference, conference.conference);
            // 40 games played plus 29 remaining
            assert!((row.projected_wins + row.projected_losses - 69.0).abs() < 1e-9);
            assert!((0.0..=1.0).contains(&row.playoff_probability));
            assert!((0.0..=1.0).contains(&row.championship_odds));
        }
    }
}

#[tokio::test]
async fn test_standings_filter_and_cache() {
    let engine = engine(nba_snapshot());
    let east = engine
        .get_conference_standings(ConferenceFilter::Eastern, 200, &seeded(3))
        .await
        .unwrap();
    assert_eq!(east.standings.len(), 1);
    assert_eq!(east.standings[0].conference, Conference::Eastern);

    // Same inputs and seed: served from cache
    let west = engine
        .get_conference_standings(ConferenceFilter::Western, 200, &seeded(3))
        .await
        .unwrap();
    assert_eq!(west.standings[0].conference, Conference::Western);
    assert_eq!(west.generated_at, east.generated_at);
    assert_eq!(engine.cache_stats().standings.hits, 1);

    // More simulations never reuse the cheaper run
    let precise = engine
        .get_conference_standings(ConferenceFilter::Western, 400, &seeded(3))
        .await
        .unwrap();
    assert_eq!(precise.simulations_used, 400);
    assert_eq!(engine.cache_stats().standings.hits, 1);
}

#[tokio::test]
async fn test_invalid_inputs_rejected_before_compute() {
    let engine = engine(nba_snapshot());

    assert!(matches!(
        engine
            .get_conference_standings(ConferenceFilter::Both, 0, &RunOptions::default())
            .await,
        Err(ForecastError::InvalidInput(_))
    ));
    assert!(matches!(
        engine.get_championship_odds(0, &RunOptions::default()).await,
        Err(ForecastError::InvalidInput(_))
    ));
    assert!(matches!(
        engine
            .predict_series(team_id(0), team_id(0), PlayoffRound::FirstRound, None)
            .await,
        Err(ForecastError::InvalidInput(_))
    ));
    assert!(matches!(
        engine
            .predict_series(team_id(0), team_id(1), PlayoffRound::FirstRound, Some(4))
            .await,
        Err(ForecastError::InvalidInput(_))
    ));
    assert!("sideways".parse::<ConferenceFilter>().is_err());
    assert!("abc".parse::<TeamId>().is_err());
}

#[tokio::test]
async fn test_unknown_team_is_not_found() {
    let engine = engine(nba_snapshot());
    assert!(matches!(
        engine
            .predict_series(team_id(0), TeamId(42), PlayoffRound::FirstRound, None)
            .await,
        Err(ForecastError::NotFound(TeamId(42)))
    ));
    assert!(matches!(
        engine.get_team_playoff_odds(TeamId(42), &seeded(1)).await,
        Err(ForecastError::NotFound(TeamId(42)))
    ));
}

#[tokio::test]
async fn test_upstream_failure_is_surfaced() {
    let engine = PlayoffEngine::new(
        Arc::new(JsonFileSource::new("/nonexistent/league.json")),
        EngineConfig::default(),
    )
    .unwrap();
    assert!(matches!(
        engine.generate_playoff_bracket(true).await,
        Err(ForecastError::UpstreamUnavailable(_))
    ));
}

#[tokio::test]
async fn test_predict_series() {
    let engine = engine(nba_snapshot());
    let forecast = engine
        .predict_series(team_id(3), team_id(20), PlayoffRound::ConferenceSemifinals, None)
        .await
        .unwrap();
    let p = &forecast.prediction;

    assert_eq!(p.best_of, 7);
    assert_eq!(p.home_court_team, team_id(3));
    assert!((p.win_probability_a + p.win_probability_b - 1.0).abs() < 1e-9);
    assert!((4..=7).contains(&p.predicted_game_count));
    assert_eq!(forecast.game_breakdown.len(), 7);
    assert_eq!(forecast.outcomes.len(), 8);

    let play_in = engine
        .predict_series(team_id(3), team_id(20), PlayoffRound::PlayIn, None)
        .await
        .unwrap();
    assert_eq!(play_in.prediction.best_of, 1);
    assert_eq!(play_in.prediction.predicted_game_count, 1);
}

#[tokio::test]
async fn test_equal_teams_without_home_court_are_even() {
    let snapshot = LeagueSnapshot {
        season: "2024-25".to_string(),
        ratings: ratings(8, |_| 1500.0, 0.0),
        records: None,
        schedule: Vec::new(),
    };
    let engine = engine(snapshot);
    let forecast = engine
        .predict_series(team_id(0), team_id(9), PlayoffRound::NbaFinals, None)
        .await
        .unwrap();
    assert!((forecast.prediction.win_probability_a - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_bracket_is_idempotent_and_complete() {
    let engine = engine(nba_snapshot());
    let first = engine.generate_playoff_bracket(false).await.unwrap();
    let second = engine.generate_playoff_bracket(false).await.unwrap();

    assert_eq!(first.bracket, second.bracket);
    assert_eq!(first.champion_probabilities, second.champion_probabilities);

    assert_eq!(first.champion_probabilities.len(), 30);
    let total: f64 = first.champion_probabilities.iter().map(|p| p.probability).sum();
    assert!((total - 1.0).abs() < 1e-6);

    let bracket = &first.bracket;
    assert_eq!(bracket.first_round.len(), 8);
    assert_eq!(bracket.conference_semifinals.len(), 4);
    assert_eq!(bracket.conference_finals.len(), 2);
    assert_eq!(bracket.champion, bracket.nba_finals.predicted_winner);

    // Play-in adds exactly one 7 seed and one 8 seed per conference
    for conference in Conference::ALL {
        let play_in = bracket.play_in.get(conference).as_ref().unwrap();
        let seeds = bracket.seeding.get(conference);
        assert!(seeds[6..10].contains(&play_in.seventh_seed));
        assert!(seeds[6..10].contains(&play_in.eighth_seed));
        assert_ne!(play_in.seventh_seed, play_in.eighth_seed);
    }
    let mut entrants: Vec<TeamId> = bracket
        .first_round
        .iter()
        .flat_map(|s| [s.team_a, s.team_b])
        .collect();
    entrants.sort();
    entrants.dedup();
    assert_eq!(entrants.len(), 16);

    // Cached read returns the same snapshot
    let cached = engine.generate_playoff_bracket(true).await.unwrap();
    assert_eq!(cached, second);
}

#[tokio::test]
async fn test_bracket_ignores_simulation_count() {
    let cheap = engine_with(
        nba_snapshot(),
        EngineConfig {
            bracket_simulations: 100,
            ..Default::default()
        },
    );
    let precise = engine_with(
        nba_snapshot(),
        EngineConfig {
            bracket_simulations: 3_000,
            ..Default::default()
        },
    );
    let a = cheap.generate_playoff_bracket(false).await.unwrap();
    let b = precise.generate_playoff_bracket(false).await.unwrap();

    assert_eq!(a.bracket, b.bracket);
    assert_eq!(a.simulations_used, 100);
    assert_eq!(b.simulations_used, 3_000);
}

#[tokio::test]
async fn test_championship_odds_sum_to_one() {
    let engine = engine_with(
        nba_snapshot(),
        EngineConfig {
            max_simulations: 2_000,
            ..Default::default()
        },
    );
    let odds = engine
        .get_championship_odds(10_000_000, &seeded(11))
        .await
        .unwrap();

    assert_eq!(odds.simulations_requested, 2_000);
    assert_eq!(odds.simulations_run, 2_000);
    assert!(odds.complete);
    assert_eq!(odds.championship_odds.len(), 30);
    let total: f64 = odds.championship_odds.iter().map(|p| p.probability).sum();
    assert!((total - 1.0).abs() < 1e-6);
    assert!(odds
        .championship_odds
        .windows(2)
        .all(|w| w[0].probability >= w[1].probability));

    for conference in Conference::ALL {
        let conf: f64 = odds.conference_odds.get(conference).iter().map(|p| p.probability).sum();
        assert!((conf - 1.0).abs() < 1e-6);
    }
}

#[tokio::test]
async fn test_balanced_sixteen_team_tournament() {
    let snapshot = LeagueSnapshot {
        season: "2024-25".to_string(),
        ratings: ratings(8, |_| 1500.0, 0.0),
        records: None,
        schedule: Vec::new(),
    };
    let engine = engine(snapshot);
    let request = TournamentRequest {
        standings: Some(SeedingInput {
            eastern: (0..8).map(team_id).collect(),
            western: (8..16).map(team_id).collect(),
        }),
        options: seeded(2025),
        ..TournamentRequest::new(5_000)
    };
    let summary = engine.simulate_tournament(&request).await.unwrap();

    assert_eq!(summary.simulations_used, 5_000);
    let expected: f64 = 1.0 / 16.0;
    let bound = 3.0 * (expected * (1.0 - expected) / 5_000.0).sqrt();
    for entry in &summary.champion_probabilities {
        assert!(
            (entry.probability - expected).abs() < bound,
            "team {} at {:.4}",
            entry.team_id,
            entry.probability
        );
    }
    let total: f64 = summary.champion_probabilities.iter().map(|p| p.probability).sum();
    assert!((total - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_standard_error_shrinks_with_more_simulations() {
    let snapshot = LeagueSnapshot {
        season: "2024-25".to_string(),
        ratings: ratings(8, |i| 1450.0 + 10.0 * (i % 8) as f64, 30.0),
        records: None,
        schedule: Vec::new(),
    };
    let engine = engine(snapshot);
    let standings = SeedingInput {
        eastern: (0..8).rev().map(team_id).collect(),
        western: (8..16).rev().map(team_id).collect(),
    };

    let run = |simulations: u32| TournamentRequest {
        standings: Some(standings.clone()),
        ..TournamentRequest::new(simulations)
    };
    let low = engine.simulate_tournament(&run(400)).await.unwrap();
    let high = engine.simulate_tournament(&run(20_000)).await.unwrap();

    let favorite = team_id(7);
    let low_se = low.championship_standard_error(favorite).unwrap();
    let high_se = high.championship_standard_error(favorite).unwrap();
    assert!(high_se < low_se, "{} !< {}", high_se, low_se);
}

#[tokio::test]
async fn test_supplied_standings_seed_the_play_in() {
    let engine = engine(nba_snapshot());
    let request = TournamentRequest {
        standings: Some(SeedingInput {
            eastern: (0..15).map(team_id).collect(),
            western: (15..30).map(team_id).collect(),
        }),
        options: seeded(8),
        ..TournamentRequest::new(1_000)
    };
    let summary = engine.simulate_tournament(&request).await.unwrap();

    for (pos, i) in (0..15).enumerate() {
        let odds = summary.team_odds(team_id(i)).unwrap();
        match pos {
            0..=5 => assert_eq!(odds.make_playoffs, 1.0),
            6..=9 => assert_eq!(odds.play_in, 1.0),
            _ => assert_eq!(odds.make_playoffs, 0.0),
        }
    }
    let field: f64 = summary.round_advancement.iter().map(|r| r.make_playoffs).sum();
    assert!((field - 16.0).abs() < 1e-9);

    // Same request but no play-in: seeds 7 and 8 are locks
    let direct = TournamentRequest {
        include_play_in: false,
        ..request.clone()
    };
    let summary = engine.simulate_tournament(&direct).await.unwrap();
    assert_eq!(summary.team_odds(team_id(7)).unwrap().make_playoffs, 1.0);
    assert_eq!(summary.team_odds(team_id(8)).unwrap().make_playoffs, 0.0);
}

#[tokio::test]
async fn test_team_odds_match_championship_odds() {
    let engine = engine_with(
        nba_snapshot(),
        EngineConfig {
            default_odds_simulations: 1_500,
            ..Default::default()
        },
    );
    let options = seeded(77);
    let odds = engine.get_championship_odds(1_500, &options).await.unwrap();
    let team = engine.get_team_playoff_odds(team_id(12), &options).await.unwrap();

    let listed = odds
        .championship_odds
        .iter()
        .find(|p| p.team_id == team_id(12))
        .unwrap()
        .probability;
    assert_eq!(team.championship_probability, listed);
    assert_eq!(team.simulations_run, 1_500);

    let r = &team.round_probabilities;
    assert!(r.make_playoffs >= r.conference_semifinals);
    assert!(r.conference_semifinals >= r.conference_finals);
    assert!(r.conference_finals >= r.nba_finals);
    assert!(r.nba_finals >= r.championship);
    assert!(team.standard_error >= 0.0);
}

#[tokio::test]
async fn test_time_budget_returns_partial_results() {
    let snapshot = LeagueSnapshot {
        season: "2024-25".to_string(),
        ratings: ratings(15, |i| 1400.0 + 5.0 * i as f64, 30.0),
        records: None,
        schedule: schedule(30, 8),
    };
    let engine = engine(snapshot);
    let request = TournamentRequest {
        options: RunOptions {
            seed: Some(5),
            time_budget: Some(Duration::from_millis(10)),
            bypass_cache: false,
        },
        ..TournamentRequest::new(100_000)
    };
    let summary = engine.simulate_tournament(&request).await.unwrap();

    assert!(summary.simulations_used >= 1);
    assert!(summary.simulations_used < 100_000);
    assert_eq!(summary.simulations_requested, 100_000);
    assert!(!summary.complete);
    let total: f64 = summary.champion_probabilities.iter().map(|p| p.probability).sum();
    assert!((total - 1.0).abs() < 1e-6);

    // Partial runs are never cached
    assert_eq!(engine.cache_stats().tournament.entries, 0);
}

#[tokio::test]
async fn test_simulation_leaves_the_runtime_free() {
    let engine = engine(nba_snapshot());
    let ticks = Arc::new(AtomicUsize::new(0));
    let ticker = tokio::spawn({
        let ticks = Arc::clone(&ticks);
        async move {
            loop {
                ticks.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        }
    });

    let odds = engine
        .get_championship_odds(20_000, &seeded(3))
        .await
        .unwrap();
    ticker.abort();

    assert!(odds.complete);
    // The single runtime thread kept polling other tasks during the run
    assert!(ticks.load(Ordering::SeqCst) > 0);
}

#[tokio::test]
async fn test_cache_invalidation() {
    let engine = engine(nba_snapshot());
    engine
        .get_conference_standings(ConferenceFilter::Both, 100, &seeded(1))
        .await
        .unwrap();
    engine.generate_playoff_bracket(true).await.unwrap();
    assert_eq!(engine.cache_stats().standings.entries, 1);
    assert_eq!(engine.cache_stats().bracket.entries, 1);

    engine.invalidate_all();
    let stats = engine.cache_stats();
    assert_eq!(stats.standings.entries, 0);
    assert_eq!(stats.bracket.entries, 0);
    assert_eq!(engine.purge_expired(), 0);
}
