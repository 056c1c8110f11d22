use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::Quota;
use std::fmt;
use std::time::Duration;

type DirectLimiter = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Spaces outbound requests at least `interval` apart across every task
/// sharing this limiter.
///
/// Backed by a GCRA limiter with a burst of one, so concurrent callers are
/// released one per interval. A zero interval disables limiting.
pub struct RateLimiter {
    interval: Duration,
    inner: Option<DirectLimiter>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            inner: Quota::with_period(interval).map(DirectLimiter::direct),
        }
    }

    /// Waits for this caller's turn. Returns immediately when disabled.
    pub async fn acquire(&self) {
        if let Some(limiter) = &self.inner {
            limiter.until_ready().await;
        }
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("interval", &self.interval)
            .field("enabled", &self.inner.is_some())
            .finish()
    }
}
