use std::collections::{HashMap, HashSet};

use crate::models::{CountryCount, GameStats, ModeCount, PlayerRecord, RoundRecord, RoundSummary};

const UNKNOWN_COUNTRY: &str = "Unknown";

/// Most recent round that has finished. Rounds still in progress are ignored.
pub fn latest_round(rounds: &[RoundRecord]) -> Option<RoundSummary> {
    rounds
        .iter()
        .filter_map(|r| r.ended_at.map(|end| (r, end)))
        .max_by_key(|(r, _)| r.id)
        .map(|(r, end)| RoundSummary {
            id: r.id,
            game_mode: r.game_mode.clone(),
            started_at: r.started_at,
            ended_at: end,
            duration_secs: (end - r.started_at).num_seconds().max(0),
            deaths: r.deaths,
        })
}

pub fn compute_game_stats(rounds: &[RoundRecord], players: &[PlayerRecord]) -> GameStats {
    if rounds.is_empty() && players.is_empty() {
        return GameStats::default();
    }

    let total_deaths = rounds.iter().map(|r| r.deaths).sum();
    let total_players = players
        .iter()
        .map(|p| p.ckey.as_str())
        .collect::<HashSet<_>>()
        .len() as u64;

    let mut ended = 0u64;
    let mut total_secs = 0i64;
    for r in rounds {
        if let Some(end) = r.ended_at {
            ended += 1;
            total_secs += (end - r.started_at).num_seconds().max(0);
        }
    }
    let avg_round_minutes = if ended > 0 {
        total_secs as f64 / ended as f64 / 60.0
    } else {
        0.0
    };

    GameStats {
        total_rounds: rounds.len() as u64,
        total_deaths,
        total_players,
        avg_round_minutes,
    }
}

pub fn count_game_modes(rounds: &[RoundRecord]) -> Vec<ModeCount> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for r in rounds {
        *counts.entry(r.game_mode.clone()).or_insert(0) += 1;
    }

    sorted_counts(counts)
        .into_iter()
        .map(|(mode, count)| ModeCount { mode, count })
        .collect()
}

/// Distinct players per country. A player seen with several countries counts
/// once for each of them.
pub fn count_countries(players: &[PlayerRecord]) -> Vec<CountryCount> {
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut counts: HashMap<String, u64> = HashMap::new();
    for p in players {
        let country = p.country.trim();
        let country = if country.is_empty() {
            UNKNOWN_COUNTRY
        } else {
            country
        };
        if seen.insert((p.ckey.as_str(), country)) {
            *counts.entry(country.to_string()).or_insert(0) += 1;
        }
    }

    sorted_counts(counts)
        .into_iter()
        .map(|(country, count)| CountryCount { country, count })
        .collect()
}

// Highest count first, ties broken by name so output is stable.
fn sorted_counts(counts: HashMap<String, u64>) -> Vec<(String, u64)> {
    let mut out: Vec<_> = counts.into_iter().collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}
