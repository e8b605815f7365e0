use chrono::Utc;
use reqwest::header::HeaderMap;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Remaining budget assumed when CallRail omits `X-RateLimit-Remaining`.
pub const DEFAULT_REMAINING: u32 = 100;

/// Copy of the rate-limit counters at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitSnapshot {
    /// Requests left in the current window.
    pub remaining: u32,
    /// Unix seconds at which the window resets (0 when unknown).
    pub reset: i64,
}

impl Default for RateLimitSnapshot {
    fn default() -> Self {
        Self {
            remaining: DEFAULT_REMAINING,
            reset: 0,
        }
    }
}

impl RateLimitSnapshot {
    /// Reads `X-RateLimit-Remaining` / `X-RateLimit-Reset`, falling back to
    /// the permissive defaults for missing or unparsable values.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let remaining = headers
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(DEFAULT_REMAINING);
        let reset = headers
            .get("x-ratelimit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(0);

        Self { remaining, reset }
    }

    /// How long to hold off before the next request, given the current time
    /// in unix milliseconds. `None` means go ahead.
    pub fn wait_duration(&self, now_millis: i64) -> Option<Duration> {
        if self.remaining > 0 {
            return None;
        }
        let reset_millis = self.reset.saturating_mul(1000);
        if reset_millis <= now_millis {
            return None;
        }
        Some(Duration::from_millis((reset_millis - now_millis) as u64))
    }
}

/// Client-side throttle shared by every clone of a `CallRailClient`.
///
/// The lock only guards reads and writes of the counter pair and is never
/// held across a request, so concurrent requests can still interleave: two
/// tasks may both see budget left and both go out. The throttle is advisory.
#[derive(Debug, Clone, Default)]
pub struct RateLimitState {
    inner: Arc<Mutex<RateLimitSnapshot>>,
}

impl RateLimitState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        match self.inner.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set(&self, snapshot: RateLimitSnapshot) {
        match self.inner.lock() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    pub fn update_from_headers(&self, headers: &HeaderMap) {
        self.set(RateLimitSnapshot::from_headers(headers));
    }

    /// Sleeps until the reset time if the budget is exhausted.
    pub async fn wait_if_exhausted(&self) {
        let snapshot = self.snapshot();
        if let Some(wait) = snapshot.wait_duration(Utc::now().timestamp_millis()) {
            tracing::warn!(
                "CallRail rate limit exhausted, waiting {}ms until reset at {}",
                wait.as_millis(),
                snapshot.reset
            );
            tokio::time::sleep(wait).await;
        }
    }
}
