//! Playoff forecasting engine facade.
//!
//! Every operation validates its arguments, fetches one league snapshot from
//! the data source and only then runs the rayon-parallel compute phase on
//! tokio's blocking pool. Results that took real simulation work are memoized
//! per input fingerprint.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bracket::{
    predict_bracket, BracketSnapshot, Seeding, SeedingInput, TournamentSeeding,
    TournamentSimulator, TournamentSummary,
};
use crate::cache::{
    extend_fingerprint, fingerprint, CacheKey, CacheStats, CachedSimulation, SimulationCache,
    SimulationMode,
};
use crate::config::EngineConfig;
use crate::error::{ForecastError, Result};
use crate::models::{
    Conference, ConferenceFilter, ConferencePair, LeagueSnapshot, PlayoffRound, RoundOdds,
    SeriesForecast, StandingsRow, TeamId, TeamProbability,
};
use crate::montecarlo::{resolve_seed, TrialPlan};
use crate::season::{SeasonProjection, SeasonProjector};
use crate::series::{validate_best_of, SeriesEvaluator};
use crate::source::LeagueDataSource;
use crate::strength::StrengthModel;

/// Per-call knobs shared by the simulation operations
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Fix for reproducible results
    pub seed: Option<u64>,
    /// Overrides the configured budget
    pub time_budget: Option<Duration>,
    /// Recompute and replace any cached result
    pub bypass_cache: bool,
}

#[derive(Debug, Clone)]
pub struct TournamentRequest {
    pub simulations: u32,
    /// Fixed standings; projected per trial when absent
    pub standings: Option<SeedingInput>,
    pub include_play_in: bool,
    pub options: RunOptions,
}

impl TournamentRequest {
    pub fn new(simulations: u32) -> Self {
        Self {
            simulations,
            standings: None,
            include_play_in: true,
            options: RunOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConferenceStandings {
    pub conference: Conference,
    pub rows: Vec<StandingsRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingsReport {
    pub season: String,
    pub standings: Vec<ConferenceStandings>,
    pub simulations_requested: u32,
    pub simulations_used: u32,
    pub complete: bool,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChampionshipOdds {
    pub season: String,
    pub championship_odds: Vec<TeamProbability>,
    pub conference_odds: ConferencePair<Vec<TeamProbability>>,
    pub simulations_run: u32,
    pub simulations_requested: u32,
    pub complete: bool,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamPlayoffOdds {
    pub team_id: TeamId,
    pub conference: Conference,
    pub championship_probability: f64,
    pub standard_error: f64,
    pub round_probabilities: RoundOdds,
    pub simulations_run: u32,
    pub last_updated: DateTime<Utc>,
}

/// Both conferences of one projection, as stored in the cache
#[derive(Debug, Clone)]
struct StandingsRun {
    projection: SeasonProjection,
    generated_at: DateTime<Utc>,
}

impl CachedSimulation for StandingsRun {
    fn simulations_used(&self) -> u32 {
        self.projection.simulations_used
    }

    fn is_complete(&self) -> bool {
        self.projection.complete
    }
}

impl CachedSimulation for TournamentSummary {
    fn simulations_used(&self) -> u32 {
        self.simulations_used
    }

    fn is_complete(&self) -> bool {
        self.complete
    }
}

impl CachedSimulation for BracketSnapshot {
    fn simulations_used(&self) -> u32 {
        self.simulations_used
    }

    fn is_complete(&self) -> bool {
        self.complete
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCacheStats {
    pub standings: CacheStats,
    pub bracket: CacheStats,
    pub tournament: CacheStats,
}

/// Settings and caches shared by the blocking compute phase
#[derive(Clone)]
struct ComputeContext {
    config: EngineConfig,
    standings_cache: Arc<SimulationCache<StandingsRun>>,
    bracket_cache: Arc<SimulationCache<BracketSnapshot>>,
    tournament_cache: Arc<SimulationCache<TournamentSummary>>,
}

impl ComputeContext {
    fn plan(&self, simulations: u32, options: &RunOptions) -> TrialPlan {
        TrialPlan::new(simulations, resolve_seed(options.seed))
            .with_budget(options.time_budget.or(self.config.time_budget))
    }

    fn standings(
        &self,
        snapshot: &LeagueSnapshot,
        model: &StrengthModel,
        simulations: u32,
        options: &RunOptions,
    ) -> Result<StandingsRun> {
        let projector =
            SeasonProjector::new(model, snapshot.records.as_deref(), &snapshot.schedule)?;

        let key = CacheKey {
            season: snapshot.season.clone(),
            fingerprint: extend_fingerprint(fingerprint(snapshot), &options.seed),
            simulations,
            mode: SimulationMode::Standings,
        };
        let (run, cached) = self.standings_cache.get_or_try_insert_with(
            key,
            self.config.standings_ttl,
            options.bypass_cache,
            || {
                Ok::<_, ForecastError>(StandingsRun {
                    projection: projector.project(&self.plan(simulations, options)),
                    generated_at: Utc::now(),
                })
            },
        )?;

        info!(
            "Standings: {}/{} simulations (cached: {})",
            run.projection.simulations_used, simulations, cached
        );
        Ok(run)
    }

    fn bracket(
        &self,
        snapshot: &LeagueSnapshot,
        model: &StrengthModel,
        use_cached: bool,
    ) -> Result<BracketSnapshot> {
        let projector =
            SeasonProjector::new(model, snapshot.records.as_deref(), &snapshot.schedule)?;
        let simulations = self.config.bracket_simulations.min(self.config.max_simulations);
        let series_length = self.config.series_length;

        let key = CacheKey {
            season: snapshot.season.clone(),
            fingerprint: extend_fingerprint(
                fingerprint(snapshot),
                &(self.config.bracket_seed, series_length),
            ),
            simulations,
            mode: SimulationMode::Bracket,
        };

        let (bracket, cached) = self.bracket_cache.get_or_try_insert_with(
            key,
            self.config.bracket_ttl,
            !use_cached,
            || {
                let seeding = projector.expected_seeding();
                let bracket = predict_bracket(model, &seeding, true, series_length)?;
                let plan = TrialPlan::new(simulations, self.config.bracket_seed)
                    .with_budget(self.config.time_budget);
                let odds = TournamentSimulator::new(
                    model,
                    TournamentSeeding::Fixed(&seeding),
                    true,
                    series_length,
                )?
                .simulate(&plan);

                Ok::<_, ForecastError>(BracketSnapshot {
                    generated_at: odds.generated_at,
                    season: snapshot.season.clone(),
                    simulations_requested: odds.simulations_requested,
                    simulations_used: odds.simulations_used,
                    complete: odds.complete,
                    bracket,
                    champion_probabilities: odds.champion_probabilities,
                })
            },
        )?;

        info!(
            "Bracket for {}: champion {} (cached: {})",
            bracket.season, bracket.bracket.champion, cached
        );
        Ok(bracket)
    }

    fn tournament(
        &self,
        snapshot: &LeagueSnapshot,
        model: &StrengthModel,
        simulations: u32,
        standings: Option<&SeedingInput>,
        include_play_in: bool,
        options: &RunOptions,
    ) -> Result<TournamentSummary> {
        let series_length = self.config.series_length;
        let fixed = standings
            .map(|input| Seeding::from_input(model, input))
            .transpose()?;
        let projector = match fixed {
            Some(_) => None,
            None => Some(SeasonProjector::new(
                model,
                snapshot.records.as_deref(),
                &snapshot.schedule,
            )?),
        };
        let seeding = match (&fixed, &projector) {
            (Some(seeding), _) => TournamentSeeding::Fixed(seeding),
            (None, Some(projector)) => TournamentSeeding::Projected(projector),
            (None, None) => return Err(ForecastError::invalid("no seeding available")),
        };
        let simulator = TournamentSimulator::new(model, seeding, include_play_in, series_length)?;

        let key = CacheKey {
            season: snapshot.season.clone(),
            fingerprint: extend_fingerprint(
                fingerprint(snapshot),
                &(options.seed, standings, series_length),
            ),
            simulations,
            mode: SimulationMode::Tournament {
                include_play_in,
                fixed_seeding: fixed.is_some(),
            },
        };

        let (summary, cached) = self.tournament_cache.get_or_try_insert_with(
            key,
            self.config.odds_ttl,
            options.bypass_cache,
            || Ok::<_, ForecastError>(simulator.simulate(&self.plan(simulations, options))),
        )?;

        info!(
            "Tournament: {}/{} simulations, complete={} (cached: {})",
            summary.simulations_used, simulations, summary.complete, cached
        );
        Ok(summary)
    }
}

/// Run simulation work on the blocking pool so runtime workers keep serving
/// other tasks, including callers waiting on the same cache key
async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(ForecastError::TaskFailed(e.to_string())),
    }
}

pub struct PlayoffEngine {
    source: Arc<dyn LeagueDataSource>,
    context: ComputeContext,
}

impl PlayoffEngine {
    pub fn new(source: Arc<dyn LeagueDataSource>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        info!(
            "Playoff engine ready: source={}, max_simulations={}, series_length={}",
            source.source_name(),
            config.max_simulations,
            config.series_length
        );
        Ok(Self {
            source,
            context: ComputeContext {
                config,
                standings_cache: Arc::new(SimulationCache::new("standings")),
                bracket_cache: Arc::new(SimulationCache::new("bracket")),
                tournament_cache: Arc::new(SimulationCache::new("tournament")),
            },
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.context.config
    }

    async fn load(&self) -> Result<(LeagueSnapshot, StrengthModel)> {
        let snapshot = self.source.load_snapshot().await?;
        let model = StrengthModel::new(snapshot.ratings.clone())?;
        Ok((snapshot, model))
    }

    /// Projected standings for one or both conferences
    pub async fn get_conference_standings(
        &self,
        conference: ConferenceFilter,
        simulations: u32,
        options: &RunOptions,
    ) -> Result<StandingsReport> {
        let simulations = self.context.config.clamp_simulations(simulations)?;
        let (snapshot, model) = self.load().await?;
        let season = snapshot.season.clone();

        let context = self.context.clone();
        let options = options.clone();
        let run = run_blocking(move || context.standings(&snapshot, &model, simulations, &options))
            .await?;

        debug!("Reporting standings for {:?}", conference);
        let standings = Conference::ALL
            .into_iter()
            .filter(|&c| conference.includes(c))
            .map(|c| ConferenceStandings {
                conference: c,
                rows: run.projection.standings.get(c).clone(),
            })
            .collect();

        Ok(StandingsReport {
            season,
            standings,
            simulations_requested: simulations,
            simulations_used: run.projection.simulations_used,
            complete: run.projection.complete,
            generated_at: run.generated_at,
        })
    }

    /// Most-likely bracket from projected seeding, with odds from a fixed-seed
    /// run so identical inputs give an identical snapshot
    pub async fn generate_playoff_bracket(&self, use_cached: bool) -> Result<BracketSnapshot> {
        let (snapshot, model) = self.load().await?;
        let context = self.context.clone();
        run_blocking(move || context.bracket(&snapshot, &model, use_cached)).await
    }

    /// Championship odds from full-season plus full-bracket trials
    pub async fn get_championship_odds(
        &self,
        simulations: u32,
        options: &RunOptions,
    ) -> Result<ChampionshipOdds> {
        let simulations = self.context.config.clamp_simulations(simulations)?;
        let (snapshot, model) = self.load().await?;
        let season = snapshot.season.clone();

        let context = self.context.clone();
        let options = options.clone();
        let summary = run_blocking(move || {
            context.tournament(&snapshot, &model, simulations, None, true, &options)
        })
        .await?;

        Ok(ChampionshipOdds {
            season,
            conference_odds: ConferencePair::from_fn(|c| summary.conference_odds(c)),
            championship_odds: summary.champion_probabilities,
            simulations_run: summary.simulations_used,
            simulations_requested: summary.simulations_requested,
            complete: summary.complete,
            last_updated: summary.generated_at,
        })
    }

    /// Exact series prediction; `team1` holds home court.
    ///
    /// Runs inline: the enumeration touches at most 25 states.
    pub async fn predict_series(
        &self,
        team1: TeamId,
        team2: TeamId,
        round: PlayoffRound,
        series_length: Option<u8>,
    ) -> Result<SeriesForecast> {
        if team1 == team2 {
            return Err(ForecastError::invalid(format!(
                "team {} cannot play itself",
                team1
            )));
        }
        let best_of = series_length.unwrap_or(match round {
            PlayoffRound::PlayIn => round.default_best_of(),
            _ => self.context.config.series_length,
        });
        validate_best_of(best_of)?;

        let (_, model) = self.load().await?;
        let a = model.require(team1)?;
        let b = model.require(team2)?;
        let forecast = SeriesEvaluator::new(&model).evaluate(a, b, best_of, a, round)?;

        info!(
            "Series {} vs {} ({}, best of {}): {:.3}",
            team1, team2, round, best_of, forecast.prediction.win_probability_a
        );
        Ok(forecast)
    }

    /// Full-bracket Monte Carlo over supplied or projected standings
    pub async fn simulate_tournament(
        &self,
        request: &TournamentRequest,
    ) -> Result<TournamentSummary> {
        let simulations = self.context.config.clamp_simulations(request.simulations)?;
        let (snapshot, model) = self.load().await?;

        let context = self.context.clone();
        let standings = request.standings.clone();
        let include_play_in = request.include_play_in;
        let options = request.options.clone();
        run_blocking(move || {
            context.tournament(
                &snapshot,
                &model,
                simulations,
                standings.as_ref(),
                include_play_in,
                &options,
            )
        })
        .await
    }

    /// One team's view of the championship-odds trials
    pub async fn get_team_playoff_odds(
        &self,
        team_id: TeamId,
        options: &RunOptions,
    ) -> Result<TeamPlayoffOdds> {
        let simulations = self.context.config.default_odds_simulations;
        let (snapshot, model) = self.load().await?;
        let conference = model.conference(model.require(team_id)?);

        let context = self.context.clone();
        let options = options.clone();
        let summary = run_blocking(move || {
            context.tournament(&snapshot, &model, simulations, None, true, &options)
        })
        .await?;

        let round_probabilities = summary
            .team_odds(team_id)
            .cloned()
            .ok_or(ForecastError::NotFound(team_id))?;
        let standard_error = summary
            .championship_standard_error(team_id)
            .unwrap_or_default();

        Ok(TeamPlayoffOdds {
            team_id,
            conference,
            championship_probability: round_probabilities.championship,
            standard_error,
            round_probabilities,
            simulations_run: summary.simulations_used,
            last_updated: summary.generated_at,
        })
    }

    pub fn cache_stats(&self) -> EngineCacheStats {
        EngineCacheStats {
            standings: self.context.standings_cache.stats(),
            bracket: self.context.bracket_cache.stats(),
            tournament: self.context.tournament_cache.stats(),
        }
    }

    /// Drop every cached result, e.g. after new ratings land
    pub fn invalidate_all(&self) {
        self.context.standings_cache.clear();
        self.context.bracket_cache.clear();
        self.context.tournament_cache.clear();
    }

    /// Drop cached tournaments run over caller-supplied standings
    pub fn invalidate_fixed_tournaments(&self) -> usize {
        self.context.tournament_cache.invalidate_mode(|mode| {
            matches!(
                mode,
                SimulationMode::Tournament {
                    fixed_seeding: true,
                    ..
                }
            )
        })
    }

    pub fn purge_expired(&self) -> usize {
        self.context.standings_cache.purge_expired()
            + self.context.bracket_cache.purge_expired()
            + self.context.tournament_cache.purge_expired()
    }
}
