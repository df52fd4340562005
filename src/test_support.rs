use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::analytics::{compute_game_stats, count_countries, count_game_modes, latest_round};
use crate::error::SourceError;
use crate::models::{
    CountryCount, GameStats, ModeCount, PlayerRecord, RoundRecord, RoundSummary, StatsDump,
};
use crate::source::StatsSource;

pub fn make_round(id: i64, mode: &str) -> RoundRecord {
    let started_at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap() + chrono::Duration::hours(id);
    RoundRecord {
        id,
        game_mode: mode.to_string(),
        started_at,
        ended_at: Some(started_at + chrono::Duration::minutes(45)),
        deaths: 2,
    }
}

pub fn make_player(ckey: &str, country: &str) -> PlayerRecord {
    PlayerRecord {
        ckey: ckey.to_string(),
        country: country.to_string(),
    }
}

/// In-memory source with switchable failures and an optional delay.
///
/// `latest_round` is always the first query of a build and `countries` the
/// last: a build counts as in flight between the two. `latest_round` also
/// freezes a copy of the dump that the rest of the same build reads from.
#[derive(Default)]
pub struct FakeSource {
    dump: Mutex<StatsDump>,
    frozen: Mutex<StatsDump>,
    delay: Duration,
    fail: AtomicBool,
    fail_countries: AtomicBool,
    in_flight: AtomicUsize,
    builds: AtomicUsize,
    max_in_flight: AtomicUsize,
    closes: AtomicUsize,
    closed_during_build: AtomicBool,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn push_round(&self, round: RoundRecord) {
        self.dump.lock().unwrap().rounds.push(round);
    }

    pub fn push_player(&self, player: PlayerRecord) {
        self.dump.lock().unwrap().players.push(player);
    }

    pub fn update(&self, f: impl FnOnce(&mut StatsDump)) {
        f(&mut self.dump.lock().unwrap());
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_countries_failing(&self, fail: bool) {
        self.fail_countries.store(fail, Ordering::SeqCst);
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn closed_during_build(&self) -> bool {
        self.closed_during_build.load(Ordering::SeqCst)
    }

    fn finish_build(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StatsSource for FakeSource {
    async fn latest_round(&self) -> Result<Option<RoundSummary>, SourceError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            self.finish_build();
            return Err(SourceError::Unavailable("connection refused".into()));
        }
        let dump = self.dump.lock().unwrap().clone();
        let latest = latest_round(&dump.rounds);
        *self.frozen.lock().unwrap() = dump;
        Ok(latest)
    }

    async fn game_stats(&self) -> Result<GameStats, SourceError> {
        let dump = self.frozen.lock().unwrap();
        Ok(compute_game_stats(&dump.rounds, &dump.players))
    }

    async fn game_modes(&self) -> Result<Vec<ModeCount>, SourceError> {
        Ok(count_game_modes(&self.frozen.lock().unwrap().rounds))
    }

    async fn countries(&self) -> Result<Vec<CountryCount>, SourceError> {
        let result = if self.fail_countries.load(Ordering::SeqCst) {
            Err(SourceError::Unavailable("country lookup timed out".into()))
        } else {
            Ok(count_countries(&self.frozen.lock().unwrap().players))
        };
        self.finish_build();
        result
    }

    async fn close(&self) {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            self.closed_during_build.store(true, Ordering::SeqCst);
        }
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
