mod config;

use anyhow::{Context, Result};
use config::{Command, Config};
use dotenv::dotenv;
use playoff_rust_core::{
    EngineConfig, JsonFileSource, PlayoffEngine, RunOptions, SeedingInput, TournamentRequest,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

async fn load_standings(path: &str) -> Result<SeedingInput> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read standings file {}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Malformed standings file {}", path))
}

async fn run(engine: &PlayoffEngine, config: &Config) -> Result<Value> {
    let defaults = engine.config();
    let options = RunOptions {
        seed: config.seed,
        ..Default::default()
    };

    let output = match config.command {
        Command::Standings => {
            let simulations = config
                .simulations
                .unwrap_or(defaults.default_standings_simulations);
            serde_json::to_value(
                engine
                    .get_conference_standings(config.conference, simulations, &options)
                    .await?,
            )?
        }
        Command::Bracket => {
            serde_json::to_value(engine.generate_playoff_bracket(config.use_cached).await?)?
        }
        Command::Odds => {
            let simulations = config.simulations.unwrap_or(defaults.default_odds_simulations);
            serde_json::to_value(engine.get_championship_odds(simulations, &options).await?)?
        }
        Command::Series => {
            let team1 = config
                .team_id
                .context("TEAM_ID must be set for the series command")?;
            let team2 = config
                .opponent_id
                .context("OPPONENT_ID must be set for the series command")?;
            serde_json::to_value(
                engine
                    .predict_series(team1, team2, config.round, None)
                    .await?,
            )?
        }
        Command::Tournament => {
            let standings = match &config.standings_path {
                Some(path) => Some(load_standings(path).await?),
                None => None,
            };
            let request = TournamentRequest {
                simulations: config.simulations.unwrap_or(defaults.default_odds_simulations),
                standings,
                include_play_in: config.include_play_in,
                options,
            };
            serde_json::to_value(engine.simulate_tournament(&request).await?)?
        }
        Command::TeamOdds => {
            let team_id = config
                .team_id
                .context("TEAM_ID must be set for the team-odds command")?;
            serde_json::to_value(engine.get_team_playoff_odds(team_id, &options).await?)?
        }
    };

    Ok(output)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Forecast Service...");

    let config = Config::from_env()?;
    let engine_config = EngineConfig::from_env().context("Invalid engine configuration")?;
    info!(
        "Command {:?} over snapshot {}",
        config.command, config.snapshot_path
    );

    let source = Arc::new(JsonFileSource::new(&config.snapshot_path));
    let engine = PlayoffEngine::new(source, engine_config)?;

    let output = run(&engine, &config).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    let stats = engine.cache_stats();
    info!(
        "Done (cache hits: standings={}, bracket={}, tournament={})",
        stats.standings.hits, stats.bracket.hits, stats.tournament.hits
    );
    Ok(())
}
