//! Minimum-interval rate limiting for upstream API calls.
//!
//! Every tool server owns one [`RateLimiter`]. Callers await
//! [`RateLimiter::wait`] before each upstream request; the limiter holds its
//! lock while sleeping off the remaining interval, so concurrent callers are
//! released one at a time and never closer together than the interval.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Time source used by the rate limiter
#[async_trait]
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current instant
    fn now(&self) -> Instant;

    /// Suspend the caller for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Manually driven clock: time only moves when a caller sleeps or the test
/// calls [`ManualClock::advance`]
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: std::sync::Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: std::sync::Mutex::new(Duration::ZERO),
        }
    }

    /// Move the clock forward without sleeping
    pub fn advance(&self, by: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(|e| e.into_inner());
        *elapsed += by;
    }

    /// Time elapsed since the clock was created
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Serializes calls so that consecutive calls are at least `interval` apart
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_call: Mutex<Option<Instant>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Limiter allowing `rate` calls per second on the tokio clock
    pub fn per_second(rate: f64) -> Self {
        Self::with_clock(interval_for(rate), Arc::new(TokioClock))
    }

    /// Limiter with an explicit interval and clock
    pub fn with_clock(interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            interval,
            last_call: Mutex::new(None),
            clock,
        }
    }

    /// Limiter that never waits
    pub fn unlimited() -> Self {
        Self::with_clock(Duration::ZERO, Arc::new(TokioClock))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the next call is allowed, then record it
    pub async fn wait(&self) {
        let mut last_call = self.last_call.lock().await;

        if let Some(last) = *last_call {
            let ready_at = last + self.interval;
            let now = self.clock.now();
            if ready_at > now {
                let deficit = ready_at - now;
                tracing::trace!(wait_ms = deficit.as_millis() as u64, "Rate limiter sleeping");
                self.clock.sleep(deficit).await;
            }
        }

        *last_call = Some(self.clock.now());
    }
}

fn interval_for(rate: f64) -> Duration {
    if rate.is_finite() && rate > 0.0 {
        Duration::from_secs_f64(1.0 / rate)
    } else {
        Duration::ZERO
    }
}
