//! A window-based rate limiter keyed by actor and operation.
//!
//! Each `(actor, operation)` pair gets a counted window. The first call (or
//! the first after expiry) opens a fresh window; calls past the tier's limit
//! are rejected with the seconds remaining until the window resets. State
//! lives behind a `std::sync::Mutex` held only for map access, never across
//! an await, so the limiter can be shared freely between tasks.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use log::*;
use thiserror::Error;
use tokio::time::interval;

use crate::config::RateLimitConfig;

#[derive(Debug, Clone, Error)]
pub enum RateLimitError {
    #[error("Rate limit exceeded. Try again in {} seconds", retry_after.as_secs())]
    Limited { retry_after: Duration },
}

/// The caller's standing, which selects the default per-window limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Anonymous,
    Authenticated,
    Premium,
}

struct Window {
    count: u32,
    expires_at: Instant,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<(String, String), Window>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Arc<Self> {
        Arc::new(Self { config, windows: Mutex::new(HashMap::new()) })
    }

    fn limit_for(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Anonymous => self.config.anonymous_limit,
            Tier::Authenticated => self.config.authenticated_limit,
            Tier::Premium => self.config.premium_limit,
        }
    }

    /// Record one call for `actor` against `operation` and decide whether it
    /// may proceed. `limit_override` replaces the tier default when a call
    /// site needs a tighter or looser policy for a specific operation.
    pub fn check(
        &self,
        actor: &str,
        operation: &str,
        tier: Tier,
        limit_override: Option<u32>,
    ) -> Result<(), RateLimitError> {
        let limit = limit_override.unwrap_or_else(|| self.limit_for(tier));
        let now = Instant::now();
        let mut windows = self.lock();
        let window = windows
            .entry((actor.to_string(), operation.to_string()))
            .or_insert_with(|| Window { count: 0, expires_at: now + self.config.window });
        if window.expires_at <= now {
            window.count = 0;
            window.expires_at = now + self.config.window;
        }
        if window.count >= limit {
            let retry_after = window.expires_at.saturating_duration_since(now);
            debug!("🚦️ {actor} throttled on {operation}: {} calls in the window", window.count);
            return Err(RateLimitError::Limited { retry_after });
        }
        window.count += 1;
        Ok(())
    }

    /// Drop every expired window. Called periodically by the sweeper so the
    /// map does not grow with every actor ever seen.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.lock();
        let before = windows.len();
        windows.retain(|_, w| w.expires_at > now);
        before - windows.len()
    }

    /// Spawn a background task that sweeps expired windows on the configured
    /// interval, for as long as any other handle to the limiter is alive.
    pub fn start_sweeper(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::downgrade(&self);
        let period = self.config.sweep_interval;
        drop(self);
        tokio::spawn(async move {
            let mut clock = interval(period);
            clock.tick().await;
            loop {
                clock.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    debug!("🕰️ Rate limiter dropped. Stopping the sweeper.");
                    break;
                };
                let swept = limiter.sweep();
                if swept > 0 {
                    trace!("🕰️ Swept {swept} expired rate-limit windows");
                }
            }
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(String, String), Window>> {
        // A poisoned mutex means a panic mid-update; the counters are
        // advisory, so carry on with whatever state is there.
        self.windows.lock().unwrap_or_else(|e| e.into_inner())
    }
}
