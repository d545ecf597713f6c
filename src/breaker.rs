//! Per-feed circuit breaker for persistently failing endpoints.
//!
//! A feed that times out or serves garbage three runs in a row is almost
//! certainly down for a while; hammering it every run wastes the fetch
//! window. The breaker counts consecutive failures per feed URL and, at the
//! threshold, disables the feed for a cooldown period. Any success resets
//! the count immediately, and a disabled feed re-enters rotation on the
//! first check after its cooldown expires.
//!
//! The breaker is plain sync state; the orchestrator wraps it in a mutex
//! and consults it before each fetch.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::{info, warn};

/// Consecutive failures before a feed is disabled.
const FAILURE_THRESHOLD: u32 = 3;

/// Default cooldown once a feed trips the breaker.
const COOLDOWN_HOURS: i64 = 24;

/// Health record for one feed endpoint.
#[derive(Debug, Clone, Default)]
pub struct FeedHealth {
    /// Consecutive failures since the last success.
    pub consecutive_failures: u32,
    /// When the feed last returned items.
    pub last_success: Option<DateTime<Utc>>,
    /// When the feed last failed a fetch.
    pub last_failure: Option<DateTime<Utc>>,
    /// When set and in the future, the feed is skipped.
    pub disabled_until: Option<DateTime<Utc>>,
}

/// Tracks feed health and gates fetch attempts.
#[derive(Debug)]
pub struct CircuitBreaker {
    feeds: HashMap<String, FeedHealth>,
    threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::with_policy(FAILURE_THRESHOLD, Duration::hours(COOLDOWN_HOURS))
    }

    /// Custom threshold and cooldown, for tests and tuning.
    pub fn with_policy(threshold: u32, cooldown: Duration) -> Self {
        Self {
            feeds: HashMap::new(),
            threshold,
            cooldown,
        }
    }

    /// Whether a feed is currently disabled.
    ///
    /// An expired cooldown closes the breaker and clears the failure count,
    /// so the feed gets a clean slate on its next attempt.
    pub fn is_disabled(&mut self, feed_url: &str) -> bool {
        let Some(health) = self.feeds.get_mut(feed_url) else {
            return false;
        };
        match health.disabled_until {
            Some(until) if Utc::now() >= until => {
                info!(feed = %feed_url, "Cooldown expired; re-enabling feed");
                health.disabled_until = None;
                health.consecutive_failures = 0;
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Record a successful fetch, resetting the feed's failure count.
    pub fn record_success(&mut self, feed_url: &str) {
        let health = self.feeds.entry(feed_url.to_string()).or_default();
        health.consecutive_failures = 0;
        health.last_success = Some(Utc::now());
        health.disabled_until = None;
    }

    /// Record a failed fetch; trips the breaker at the threshold.
    pub fn record_failure(&mut self, feed_url: &str) {
        let health = self.feeds.entry(feed_url.to_string()).or_default();
        health.consecutive_failures += 1;
        health.last_failure = Some(Utc::now());
        if health.consecutive_failures >= self.threshold && health.disabled_until.is_none() {
            let until = Utc::now() + self.cooldown;
            warn!(
                feed = %feed_url,
                failures = health.consecutive_failures,
                until = %until,
                "Disabling feed after repeated failures"
            );
            health.disabled_until = Some(until);
        }
    }

    /// Current health of a feed, if it has ever been recorded.
    pub fn health(&self, feed_url: &str) -> Option<&FeedHealth> {
        self.feeds.get(feed_url)
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = "https://example.com/rss";

    #[test]
    fn test_unknown_feed_is_enabled() {
        let mut breaker = CircuitBreaker::new();
        assert!(!breaker.is_disabled(FEED));
    }

    #[test]
    fn test_trips_after_three_consecutive_failures() {
        let mut breaker = CircuitBreaker::new();
        breaker.record_failure(FEED);
        breaker.record_failure(FEED);
        assert!(!breaker.is_disabled(FEED));

        breaker.record_failure(FEED);
        assert!(breaker.is_disabled(FEED));
    }

    #[test]
    fn test_success_resets_failure_count() {
        let mut breaker = CircuitBreaker::new();
        breaker.record_failure(FEED);
        breaker.record_failure(FEED);
        breaker.record_success(FEED);
        breaker.record_failure(FEED);
        breaker.record_failure(FEED);

        // Two failures after the reset; still below the threshold.
        assert!(!breaker.is_disabled(FEED));
        assert_eq!(breaker.health(FEED).unwrap().consecutive_failures, 2);
    }

    #[test]
    fn test_attempt_timestamps_are_recorded() {
        let mut breaker = CircuitBreaker::new();
        breaker.record_failure(FEED);
        let health = breaker.health(FEED).unwrap();
        assert!(health.last_failure.is_some());
        assert!(health.last_success.is_none());

        breaker.record_success(FEED);
        let health = breaker.health(FEED).unwrap();
        assert!(health.last_success.is_some());
        // The failure history stays visible after recovery.
        assert!(health.last_failure.is_some());
    }

    #[test]
    fn test_expired_cooldown_re_enables_with_clean_slate() {
        let mut breaker = CircuitBreaker::with_policy(3, Duration::zero());
        breaker.record_failure(FEED);
        breaker.record_failure(FEED);
        breaker.record_failure(FEED);

        // Zero cooldown: disabled_until is already in the past.
        assert!(!breaker.is_disabled(FEED));
        assert_eq!(breaker.health(FEED).unwrap().consecutive_failures, 0);
    }

    #[test]
    fn test_feeds_are_tracked_independently() {
        let mut breaker = CircuitBreaker::new();
        for _ in 0..3 {
            breaker.record_failure("https://bad.example.com/rss");
        }
        assert!(breaker.is_disabled("https://bad.example.com/rss"));
        assert!(!breaker.is_disabled("https://good.example.com/rss"));
    }
}
