use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::error::SourceError;
use crate::models::Snapshot;
use crate::source::StatsSource;

/// Run every aggregate query and assemble a snapshot. Any failing query fails
/// the whole build; partial snapshots are never produced. `computed_at` is the
/// time the build starts.
pub async fn build_snapshot<S>(
    source: &S,
    generation: u64,
    computed_at: DateTime<Utc>,
) -> Result<Snapshot, SourceError>
where
    S: StatsSource + ?Sized,
{
    let started = Instant::now();

    let latest_round = source.latest_round().await?;
    let game_stats = source.game_stats().await?;
    let game_modes = source.game_modes().await?;
    let countries = source.countries().await?;

    Ok(Snapshot {
        generation,
        latest_round,
        game_stats,
        game_modes,
        countries,
        computed_at,
        compute_duration: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GameStats;
    use crate::test_support::{make_player, make_round, FakeSource};

    #[tokio::test]
    async fn test_build_snapshot_empty_source() {
        let source = FakeSource::new();
        let snapshot = build_snapshot(&source, 1, Utc::now()).await.unwrap();
        assert_eq!(snapshot.generation, 1);
        assert!(snapshot.latest_round.is_none());
        assert_eq!(snapshot.game_stats, GameStats::default());
        assert!(snapshot.game_modes.is_empty());
        assert!(snapshot.countries.is_empty());
    }

    #[tokio::test]
    async fn test_build_snapshot_populates_all_fields() {
        let source = FakeSource::new();
        source.push_round(make_round(7, "traitor"));
        source.push_player(make_player("alice", "NZ"));
        let snapshot = build_snapshot(&source, 3, Utc::now()).await.unwrap();
        assert_eq!(snapshot.latest_round.as_ref().map(|r| r.id), Some(7));
        assert_eq!(snapshot.game_stats.total_rounds, 1);
        assert_eq!(snapshot.game_modes[0].mode, "traitor");
        assert_eq!(snapshot.countries[0].country, "NZ");
    }

    #[tokio::test]
    async fn test_build_snapshot_fails_on_any_query_error() {
        let source = FakeSource::new();
        source.push_round(make_round(1, "traitor"));
        source.set_countries_failing(true);
        assert!(matches!(
            build_snapshot(&source, 1, Utc::now()).await,
            Err(SourceError::Unavailable(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_build_snapshot_measures_duration() {
        let source = FakeSource::with_delay(std::time::Duration::from_secs(3));
        let snapshot = build_snapshot(&source, 1, Utc::now()).await.unwrap();
        assert!(snapshot.compute_duration >= std::time::Duration::from_secs(3));
    }
}
