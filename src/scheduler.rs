//! Periodic catalog refresh.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

/// Shortest interval the scheduler will arm, whatever the configuration says.
/// Keeps a misconfigured client from hammering the catalog endpoint.
pub const MIN_REFRESH_MINUTES: i64 = 5;

/// Re-armable recurring timer. At most one timer is active at a time; arming
/// again aborts the previous one.
#[derive(Debug, Default)]
pub struct RefreshScheduler {
    handle: Option<JoinHandle<()>>,
    interval: Option<Duration>,
}

/// Longest interval the scheduler will arm: one week.
pub const MAX_REFRESH_MINUTES: i64 = 7 * 24 * 60;

/// Effective interval for a requested number of minutes, kept within
/// `[MIN_REFRESH_MINUTES, MAX_REFRESH_MINUTES]`.
pub fn clamp_interval(requested_minutes: i64) -> Duration {
    let minutes = requested_minutes.clamp(MIN_REFRESH_MINUTES, MAX_REFRESH_MINUTES) as u64;
    Duration::from_secs(minutes.saturating_mul(60))
}

impl RefreshScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any running timer and arm a new one that runs `tick` every
    /// `requested_minutes`, clamped by `clamp_interval`. The first tick
    /// fires one full interval from now. Must be called within a tokio runtime.
    pub fn schedule<F, Fut>(&mut self, requested_minutes: i64, tick: F) -> Duration
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();

        let period = clamp_interval(requested_minutes);
        debug!(
            requested_minutes,
            effective_secs = period.as_secs(),
            "Arming refresh timer"
        );

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                tick().await;
            }
        });

        self.handle = Some(handle);
        self.interval = Some(period);
        period
    }

    /// Stop the timer. Safe to call when nothing is armed.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("Refresh timer cancelled");
        }
        self.interval = None;
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Interval of the armed timer, if any.
    pub fn effective_interval(&self) -> Option<Duration> {
        self.interval
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
