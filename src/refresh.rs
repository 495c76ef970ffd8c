//! Background schedule refresh
//!
//! Periodically fetches a new snapshot and publishes it into the shared
//! [`CacheCell`]. Failed attempts are retried according to a [`RetryPolicy`];
//! when every attempt in a cycle fails the previous snapshot stays in place
//! and the loop simply tries again after the next interval.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheCell;
use crate::data::ScheduleSource;

/// Default number of fetch attempts per cycle
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default wait after a failed attempt
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Default time between refresh cycles
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// How the wait grows between consecutive failed attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Always wait the base delay
    #[default]
    Fixed,
    /// Multiply the delay by `factor` after each failure, up to `max_delay`
    Exponential { factor: u32, max_delay: Duration },
}

/// Retry behaviour within a single refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per cycle, including the first one
    pub max_attempts: u32,
    /// Base wait after a failed attempt
    pub delay: Duration,
    /// Growth of the wait between attempts
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    /// Wait after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential { factor, max_delay } => {
                let multiplier = factor.saturating_pow(attempt.saturating_sub(1));
                self.delay.saturating_mul(multiplier).min(max_delay)
            }
        }
    }
}

/// Configuration for the refresh loop
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Time between the end of one cycle and the start of the next
    pub interval: Duration,
    /// Retry behaviour within a cycle
    pub retry: RetryPolicy,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REFRESH_INTERVAL,
            retry: RetryPolicy::default(),
        }
    }
}

/// Source of all waiting done by the refresh loop
///
/// Tests swap in an implementation that returns immediately.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Result of one refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A new snapshot was published after this many attempts
    Updated { attempts: u32 },
    /// Every attempt failed and the cache was left untouched
    Exhausted { attempts: u32 },
}

/// Drives a [`ScheduleSource`] and publishes its results into a cache cell
pub struct Refresher<S, Z = TokioSleeper> {
    source: S,
    cell: Arc<CacheCell>,
    config: RefreshConfig,
    sleeper: Z,
}

impl<S: ScheduleSource> Refresher<S, TokioSleeper> {
    /// Creates a refresher that waits on the tokio timer
    pub fn new(source: S, cell: Arc<CacheCell>, config: RefreshConfig) -> Self {
        Self {
            source,
            cell,
            config,
            sleeper: TokioSleeper,
        }
    }
}

impl<S, Z> Refresher<S, Z>
where
    S: ScheduleSource + 'static,
    Z: Sleeper + 'static,
{
    /// Replaces the sleeper used for retry delays and interval waits
    pub fn with_sleeper<Z2: Sleeper>(self, sleeper: Z2) -> Refresher<S, Z2> {
        Refresher {
            source: self.source,
            cell: self.cell,
            config: self.config,
            sleeper,
        }
    }

    /// Runs a single refresh cycle
    ///
    /// Each failed attempt is followed by the policy delay, including the last
    /// one, so a failing upstream is never hit more often than that.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let max_attempts = self.config.retry.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.source.fetch().await {
                Ok(snapshot) => {
                    self.cell.write(snapshot);
                    info!(attempt, "schedule refreshed");
                    return CycleOutcome::Updated { attempts: attempt };
                }
                Err(err) => {
                    warn!(attempt, max_attempts, error = %err, "schedule fetch attempt failed");
                    self.sleeper.sleep(self.config.retry.delay_for(attempt)).await;
                }
            }
        }

        let entry = self.cell.read();
        match entry.age(Utc::now()) {
            Some(age) => warn!(
                age_secs = age.num_seconds(),
                "all retry attempts failed, serving previously fetched schedule"
            ),
            None => warn!("all retry attempts failed, no schedule fetched yet"),
        }
        CycleOutcome::Exhausted {
            attempts: max_attempts,
        }
    }

    /// Spawns the refresh loop as a background task
    ///
    /// The first cycle starts immediately. The loop runs until
    /// [`RefreshHandle::shutdown`] is called or the handle is dropped; an
    /// in-flight cycle always runs to completion first.
    pub fn spawn(self) -> RefreshHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let task = tokio::spawn(async move {
            loop {
                let outcome = self.run_cycle().await;
                debug!(?outcome, interval_secs = self.config.interval.as_secs(), "refresh cycle finished");

                tokio::select! {
                    _ = self.sleeper.sleep(self.config.interval) => {}
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
            info!("refresh loop stopped");
        });

        RefreshHandle { shutdown_tx, task }
    }
}

/// Handle for controlling the background refresh task
pub struct RefreshHandle {
    /// Signals the loop to stop at its next wait
    shutdown_tx: mpsc::Sender<()>,
    /// The spawned loop
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Stops the refresh loop and waits for it to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
    }
}
