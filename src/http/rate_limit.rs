//! Client-side rate limiting
//!
//! A governor token bucket paces requests under the provider's quota. A
//! client can also opt in to holding the limiter off when the provider
//! still throttles (429 with `Retry-After`), so every request sharing the
//! client waits out the same window.

use crate::classify::MAX_RETRY_AFTER;
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

type DirectLimiter = Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Token bucket settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Sustained requests per second
    pub requests_per_second: u32,
    /// Requests allowed back to back before pacing starts
    pub burst_size: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10,
            burst_size: 10,
        }
    }
}

impl RateLimiterConfig {
    /// Create a config
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        Self {
            requests_per_second,
            burst_size,
        }
    }

    /// Governor quota; zero values are raised to one
    fn quota(&self) -> Quota {
        let rate = NonZeroU32::new(self.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(self.burst_size).unwrap_or(NonZeroU32::MIN);
        Quota::per_second(rate).allow_burst(burst)
    }
}

/// Rate limiter shared by every request of one client.
///
/// Clones share the bucket and the hold-off window.
#[derive(Clone)]
pub struct RateLimiter {
    bucket: Arc<DirectLimiter>,
    resume_at: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    /// Create a limiter from `config`
    pub fn new(config: &RateLimiterConfig) -> Self {
        Self {
            bucket: Arc::new(Governor::direct(config.quota())),
            resume_at: Arc::new(Mutex::new(None)),
        }
    }

    /// Block all requests for `delay` from now.
    ///
    /// A shorter hold-off never cuts an existing longer one short.
    pub fn hold_off(&self, delay: Duration) {
        let now = Instant::now();
        // Past the clock's range: hold off for the ceiling instead
        let until = now
            .checked_add(delay)
            .or_else(|| now.checked_add(MAX_RETRY_AFTER))
            .unwrap_or(now);
        let mut resume_at = self.resume_at.lock().unwrap_or_else(PoisonError::into_inner);
        if resume_at.map_or(true, |at| at < until) {
            *resume_at = Some(until);
        }
    }

    /// End of the current hold-off, if one is active
    pub fn resume_at(&self) -> Option<Instant> {
        let resume_at = *self.resume_at.lock().unwrap_or_else(PoisonError::into_inner);
        resume_at.filter(|at| *at > Instant::now())
    }

    /// Wait out any hold-off, then for a token
    pub async fn wait(&self) {
        if let Some(at) = self.resume_at() {
            debug!(
                wait_ms = at.saturating_duration_since(Instant::now()).as_millis() as u64,
                "rate limiter held off"
            );
            tokio::time::sleep_until(at).await;
        }
        self.bucket.until_ready().await;
    }

    /// Take a token without waiting; fails while held off or when empty
    pub fn try_acquire(&self) -> bool {
        self.resume_at().is_none() && self.bucket.check().is_ok()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("resume_at", &self.resume_at())
            .finish_non_exhaustive()
    }
}
