use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundRecord {
    pub id: i64,
    pub game_mode: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deaths: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerRecord {
    pub ckey: String,
    #[serde(default)]
    pub country: String,
}

/// Contents of the round database dump read by `FileSource`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsDump {
    #[serde(default)]
    pub rounds: Vec<RoundRecord>,
    #[serde(default)]
    pub players: Vec<PlayerRecord>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RoundSummary {
    pub id: i64,
    pub game_mode: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: i64,
    pub deaths: u64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct GameStats {
    pub total_rounds: u64,
    pub total_deaths: u64,
    pub total_players: u64,
    pub avg_round_minutes: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ModeCount {
    pub mode: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CountryCount {
    pub country: String,
    pub count: u64,
}

/// One generation of aggregate statistics. Never mutated after it is built;
/// the cache replaces the whole value on every successful refresh.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub generation: u64,
    pub latest_round: Option<RoundSummary>,
    pub game_stats: GameStats,
    pub game_modes: Vec<ModeCount>,
    pub countries: Vec<CountryCount>,
    /// Time the computation started.
    pub computed_at: DateTime<Utc>,
    #[serde(with = "duration_millis")]
    pub compute_duration: Duration,
}

pub type SharedSnapshot = Arc<Snapshot>;

mod duration_millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}
