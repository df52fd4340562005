//! Refresh-and-serve cache for aggregate statistics.
//!
//! A single background task rebuilds a [`Snapshot`] from the [`StatsSource`]
//! on a fixed interval and publishes it by swapping one `Arc`. Readers load
//! that `Arc` without locking, so they always see one complete generation and
//! never wait for a refresh in progress.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::CacheError;
use crate::models::{CountryCount, GameStats, ModeCount, RoundSummary, SharedSnapshot, Snapshot};
use crate::snapshot::build_snapshot;
use crate::source::StatsSource;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub refresh_interval: Duration,
    /// How long `stop` waits for an in-flight refresh before giving up on it.
    pub shutdown_grace: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Published(u64),
    /// Another refresh was already running.
    Skipped,
    /// The source failed; the previous snapshot is still current.
    Failed,
    /// The cache was stopped while the refresh ran; its result was dropped.
    Discarded,
}

enum Lifecycle {
    Idle,
    Running {
        stop_tx: watch::Sender<bool>,
        handle: JoinHandle<()>,
    },
    Stopped,
}

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

struct Inner {
    source: Arc<dyn StatsSource>,
    current: ArcSwapOption<Snapshot>,
    clock: Clock,
    // Held for the whole of a refresh. `stop` locks it to wait one out.
    refresh_lock: AsyncMutex<()>,
    stopped: AtomicBool,
    closed: AtomicBool,
}

/// Keep `computed_at` strictly increasing across generations even if the wall
/// clock steps backwards between two refreshes.
fn stamp_after(snapshot: &mut Snapshot, previous: Option<&Snapshot>) {
    if let Some(prev) = previous {
        if snapshot.computed_at <= prev.computed_at {
            snapshot.computed_at = prev.computed_at + chrono::Duration::nanoseconds(1);
        }
    }
}

impl Inner {
    async fn refresh(&self) -> RefreshOutcome {
        let Ok(_permit) = self.refresh_lock.try_lock() else {
            debug!("Refresh already in flight, skipping");
            return RefreshOutcome::Skipped;
        };
        if self.stopped.load(Ordering::Acquire) {
            return RefreshOutcome::Discarded;
        }

        // Only the lock holder publishes, so this cannot race another writer.
        let previous = self.current.load_full();
        let generation = previous.as_ref().map_or(0, |s| s.generation) + 1;
        match build_snapshot(self.source.as_ref(), generation, (self.clock)()).await {
            Ok(_) if self.stopped.load(Ordering::Acquire) => {
                debug!("Cache stopped during refresh, dropping generation {}", generation);
                RefreshOutcome::Discarded
            }
            Ok(mut snapshot) => {
                stamp_after(&mut snapshot, previous.as_deref());
                debug!(
                    "Published stats generation {} in {:?} ({} rounds)",
                    generation, snapshot.compute_duration, snapshot.game_stats.total_rounds
                );
                self.current.store(Some(Arc::new(snapshot)));
                RefreshOutcome::Published(generation)
            }
            Err(e) => {
                match self.current.load().as_ref() {
                    Some(prev) => warn!(
                        "Stats refresh failed, keeping generation {}: {}",
                        prev.generation, e
                    ),
                    None => error!("Stats refresh failed, no snapshot available yet: {}", e),
                }
                RefreshOutcome::Failed
            }
        }
    }

    fn generation(&self) -> u64 {
        self.current.load().as_ref().map_or(0, |s| s.generation)
    }

    async fn close_source(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.source.close().await;
        }
    }

    async fn run(self: Arc<Self>, interval: Duration, mut stop_rx: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        // A tick that comes due while a refresh is running is dropped, not queued.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Stats refresh loop started (interval: {:?})", interval);

        loop {
            tokio::select! {
                biased;
                // Also fires with Err when the cache is dropped.
                _ = stop_rx.changed() => break,
                _ = ticker.tick() => {
                    self.refresh().await;
                }
            }
        }

        info!("Stats refresh loop stopped");
    }
}

/// Process-wide statistics cache. Create one during startup and share it by
/// `Arc` with whatever needs to read stats.
pub struct StatsCache {
    inner: Arc<Inner>,
    config: CacheConfig,
    lifecycle: Mutex<Lifecycle>,
}

impl StatsCache {
    /// The cache starts empty; call [`StatsCache::start`] to begin refreshing.
    pub fn new(source: Arc<dyn StatsSource>, config: CacheConfig) -> Self {
        Self::with_clock(source, config, Box::new(Utc::now))
    }

    fn with_clock(source: Arc<dyn StatsSource>, config: CacheConfig, clock: Clock) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                current: ArcSwapOption::empty(),
                clock,
                refresh_lock: AsyncMutex::new(()),
                stopped: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
            config,
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Spawn the refresh loop. The first refresh runs immediately, then once
    /// per interval. Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), CacheError> {
        let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        match *lifecycle {
            Lifecycle::Running { .. } => return Err(CacheError::AlreadyStarted),
            Lifecycle::Stopped => return Err(CacheError::Stopped),
            Lifecycle::Idle => {}
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(
            self.inner
                .clone()
                .run(self.config.refresh_interval, stop_rx),
        );
        *lifecycle = Lifecycle::Running { stop_tx, handle };
        Ok(())
    }

    /// Stop scheduling refreshes and release the source.
    ///
    /// A refresh already in flight, from the loop or `refresh_now`, is allowed
    /// to finish for up to the shutdown grace period but its result is dropped.
    /// After the grace period shutdown carries on without it. Calling this
    /// again, or concurrently, is a no-op.
    pub async fn stop(&self) {
        let previous = {
            let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *lifecycle, Lifecycle::Stopped)
        };
        self.inner.stopped.store(true, Ordering::Release);

        let deadline = Instant::now() + self.config.shutdown_grace;
        match previous {
            Lifecycle::Stopped => return,
            Lifecycle::Idle => {}
            Lifecycle::Running { stop_tx, handle } => {
                info!("Stopping stats cache");
                let _ = stop_tx.send(true);
                match tokio::time::timeout_at(deadline, handle).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!("Stats refresh task ended abnormally: {}", e),
                    Err(_) => warn!(
                        "Stats refresh loop still running after {:?}, shutting down without it",
                        self.config.shutdown_grace
                    ),
                }
            }
        }

        // Covers refreshes started through `refresh_now` as well as the loop.
        let lock = self.inner.refresh_lock.lock();
        let _permit = match tokio::time::timeout_at(deadline, lock).await {
            Ok(permit) => Some(permit),
            Err(_) => {
                warn!(
                    "Stats refresh still running after {:?}, closing source anyway",
                    self.config.shutdown_grace
                );
                None
            }
        };
        self.inner.close_source().await;
    }

    /// Run one refresh cycle now. Returns `Skipped` if a refresh is already
    /// running, whether from the loop or another caller.
    #[allow(dead_code)]
    pub async fn refresh_now(&self) -> Result<RefreshOutcome, CacheError> {
        if self.inner.stopped.load(Ordering::Acquire) {
            return Err(CacheError::Stopped);
        }
        Ok(self.inner.refresh().await)
    }

    pub fn is_running(&self) -> bool {
        matches!(
            *self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner),
            Lifecycle::Running { .. }
        )
    }

    /// Latest published generation, 0 before the first successful refresh.
    pub fn generation(&self) -> u64 {
        self.inner.generation()
    }

    /// Current snapshot, or `None` until the first refresh succeeds.
    pub fn snapshot(&self) -> Option<SharedSnapshot> {
        self.inner.current.load_full()
    }

    pub fn current(&self) -> Result<SharedSnapshot, CacheError> {
        self.snapshot().ok_or(CacheError::NotReady)
    }

    pub fn latest_round(&self) -> Result<Option<RoundSummary>, CacheError> {
        Ok(self.current()?.latest_round.clone())
    }

    pub fn game_stats(&self) -> Result<GameStats, CacheError> {
        Ok(self.current()?.game_stats.clone())
    }

    pub fn game_modes(&self) -> Result<Vec<ModeCount>, CacheError> {
        Ok(self.current()?.game_modes.clone())
    }

    pub fn countries(&self) -> Result<Vec<CountryCount>, CacheError> {
        Ok(self.current()?.countries.clone())
    }
}
