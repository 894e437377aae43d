//! League data source abstractions
//!
//! The engine never owns ratings, records or schedules. A `LeagueDataSource`
//! hands over one immutable snapshot per call, fetched before any
//! simulation starts.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{ForecastError, Result};
use crate::models::LeagueSnapshot;

/// Supplier of league inputs (ratings, records to date, remaining schedule)
#[async_trait]
pub trait LeagueDataSource: Send + Sync {
    /// Fetch the current snapshot. Unreachable sources surface as
    /// `UpstreamUnavailable`; nothing is fabricated.
    async fn load_snapshot(&self) -> Result<LeagueSnapshot>;

    /// Source name for logging and debugging
    fn source_name(&self) -> &str;
}

/// Fixed in-memory snapshot
#[derive(Debug, Clone)]
pub struct StaticLeagueSource {
    snapshot: LeagueSnapshot,
}

impl StaticLeagueSource {
    pub fn new(snapshot: LeagueSnapshot) -> Self {
        Self { snapshot }
    }
}

#[async_trait]
impl LeagueDataSource for StaticLeagueSource {
    async fn load_snapshot(&self) -> Result<LeagueSnapshot> {
        Ok(self.snapshot.clone())
    }

    fn source_name(&self) -> &str {
        "static"
    }
}

/// Snapshot read from a JSON file on every load
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl LeagueDataSource for JsonFileSource {
    async fn load_snapshot(&self) -> Result<LeagueSnapshot> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            warn!("Failed to read league snapshot {}: {}", self.path.display(), e);
            ForecastError::upstream(format!("{}: {}", self.path.display(), e))
        })?;

        let snapshot: LeagueSnapshot = serde_json::from_str(&content).map_err(|e| {
            ForecastError::invalid(format!(
                "malformed league snapshot {}: {}",
                self.path.display(),
                e
            ))
        })?;

        debug!(
            "Loaded {} teams, {} fixtures from {}",
            snapshot.ratings.len(),
            snapshot.schedule.len(),
            self.path.display()
        );
        Ok(snapshot)
    }

    fn source_name(&self) -> &str {
        "json_file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{}-{}.json", name, std::process::id()))
    }

    #[tokio::test]
    async fn test_json_file_source_loads_snapshot() {
        let path = temp_path("league-ok");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"season": "2024-25", "ratings": [{{"team_id": 7, "conference": "Western", "rating": 1510.5}}]}}"#
        )
        .unwrap();

        let source = JsonFileSource::new(&path);
        let snapshot = source.load_snapshot().await.unwrap();
        assert_eq!(snapshot.season, "2024-25");
        assert_eq!(snapshot.ratings[0].rating, 1510.5);
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_missing_file_is_upstream_unavailable() {
        let source = JsonFileSource::new("/nonexistent/league_snapshot.json");
        assert!(matches!(
            source.load_snapshot().await,
            Err(ForecastError::UpstreamUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_file_is_invalid_input() {
        let path = temp_path("league-bad");
        std::fs::write(&path, "{ not json").unwrap();
        let source = JsonFileSource::new(&path);
        assert!(matches!(
            source.load_snapshot().await,
            Err(ForecastError::InvalidInput(_))
        ));
        std::fs::remove_file(&path).ok();
    }
}
