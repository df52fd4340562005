use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::analytics::{compute_game_stats, count_countries, count_game_modes, latest_round};
use crate::error::SourceError;
use crate::models::{CountryCount, GameStats, ModeCount, RoundSummary, StatsDump};

/// Read-only aggregate queries against the backing store.
///
/// Implementations may be slow. The cache calls them from a single background
/// task, one refresh at a time, and calls `close` exactly once on shutdown.
#[async_trait]
pub trait StatsSource: Send + Sync + 'static {
    async fn latest_round(&self) -> Result<Option<RoundSummary>, SourceError>;

    async fn game_stats(&self) -> Result<GameStats, SourceError>;

    async fn game_modes(&self) -> Result<Vec<ModeCount>, SourceError>;

    async fn countries(&self) -> Result<Vec<CountryCount>, SourceError>;

    async fn close(&self) {}
}

/// Serves aggregates from a JSON dump of the round database. The file is read
/// again on every query so a replaced dump shows up on the next refresh.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<StatsDump, SourceError> {
        let bytes = tokio::fs::read(&self.path).await?;
        // Usually caught mid-rewrite by the exporter.
        if bytes.is_empty() {
            return Err(SourceError::Unavailable(format!("{:?} is empty", self.path)));
        }
        let dump = serde_json::from_slice(&bytes)?;
        Ok(dump)
    }
}

#[async_trait]
impl StatsSource for FileSource {
    async fn latest_round(&self) -> Result<Option<RoundSummary>, SourceError> {
        let dump = self.load().await?;
        Ok(latest_round(&dump.rounds))
    }

    async fn game_stats(&self) -> Result<GameStats, SourceError> {
        let dump = self.load().await?;
        Ok(compute_game_stats(&dump.rounds, &dump.players))
    }

    async fn game_modes(&self) -> Result<Vec<ModeCount>, SourceError> {
        let dump = self.load().await?;
        Ok(count_game_modes(&dump.rounds))
    }

    async fn countries(&self) -> Result<Vec<CountryCount>, SourceError> {
        let dump = self.load().await?;
        Ok(count_countries(&dump.players))
    }

    async fn close(&self) {
        debug!("Closing file source {:?}", self.path);
    }
}
