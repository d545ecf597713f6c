//! Token-bucket rate limiter for the enrichment service.
//!
//! The bucket holds a small burst allowance ([`CAPACITY`]) and refills
//! slowly ([`REFILL_PER_SEC`]), with a minimum spacing between consecutive
//! calls. Callers reserve a slot while holding the lock and then sleep
//! outside it, so concurrent acquirers queue up in order without holding
//! the mutex across an await.
//!
//! When the computed wait exceeds [`MAX_WAIT`] the acquire is refused
//! ([`Acquire::Skipped`]) without consuming a token; the engine responds by
//! falling back rather than stalling the whole run.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Burst allowance in tokens.
const CAPACITY: f64 = 5.0;

/// Refill rate in tokens per second (one call every 10 seconds sustained).
const REFILL_PER_SEC: f64 = 0.1;

/// Minimum spacing between consecutive calls.
const MIN_INTERVAL: Duration = Duration::from_secs(2);

/// Longest a caller is allowed to queue before being refused.
const MAX_WAIT: Duration = Duration::from_secs(60);

/// Outcome of a token acquisition attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum Acquire {
    /// A token was obtained (possibly after waiting).
    Acquired,
    /// The wait would have exceeded the cap; no token was consumed.
    Skipped,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
    /// Earliest instant the next call may run, accounting for reservations
    /// already handed out and the minimum inter-call spacing.
    next_allowed: Instant,
}

/// Shared token bucket. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_per_sec: f64,
    min_interval: Duration,
    max_wait: Duration,
}

impl TokenBucket {
    pub fn new() -> Self {
        Self::with_policy(CAPACITY, REFILL_PER_SEC, MIN_INTERVAL, MAX_WAIT)
    }

    /// Custom policy, for tests and tuning.
    pub fn with_policy(
        capacity: f64,
        refill_per_sec: f64,
        min_interval: Duration,
        max_wait: Duration,
    ) -> Self {
        let now = Instant::now();
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: now,
                next_allowed: now,
            }),
            capacity,
            refill_per_sec,
            min_interval,
            max_wait,
        }
    }

    /// Acquire one token, waiting for refill and spacing as needed.
    ///
    /// Returns [`Acquire::Skipped`] without consuming anything when the
    /// required wait exceeds the configured cap.
    pub async fn acquire(&self) -> Acquire {
        let run_at = {
            let mut state = self.state.lock().await;
            let now = Instant::now();

            // Refill for the time elapsed since the last accounting point.
            let elapsed = now.saturating_duration_since(state.last_refill);
            state.tokens =
                (state.tokens + elapsed.as_secs_f64() * self.refill_per_sec).min(self.capacity);
            state.last_refill = now;

            let token_wait = if state.tokens >= 1.0 {
                Duration::ZERO
            } else {
                Duration::from_secs_f64((1.0 - state.tokens) / self.refill_per_sec)
            };
            let run_at = (now + token_wait).max(state.next_allowed);

            if run_at.saturating_duration_since(now) > self.max_wait {
                debug!(
                    wait_secs = run_at.saturating_duration_since(now).as_secs(),
                    "Rate limiter refused acquisition"
                );
                return Acquire::Skipped;
            }

            // Reserve: account the token at the instant the call will run.
            let refilled_by_then =
                run_at.saturating_duration_since(now).as_secs_f64() * self.refill_per_sec;
            state.tokens = (state.tokens + refilled_by_then).min(self.capacity) - 1.0;
            state.last_refill = run_at;
            state.next_allowed = run_at + self.min_interval;
            run_at
        };

        tokio::time::sleep_until(run_at).await;
        Acquire::Acquired
    }
}

impl Default for TokenBucket {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_burst_within_capacity_is_immediate() {
        let bucket = TokenBucket::with_policy(
            5.0,
            0.1,
            Duration::ZERO,
            Duration::from_secs(60),
        );
        let start = Instant::now();
        for _ in 0..5 {
            assert_eq!(bucket.acquire().await, Acquire::Acquired);
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sixth_call_waits_for_refill() {
        let bucket = TokenBucket::with_policy(
            5.0,
            0.1,
            Duration::ZERO,
            Duration::from_secs(60),
        );
        for _ in 0..5 {
            bucket.acquire().await;
        }

        let start = Instant::now();
        assert_eq!(bucket.acquire().await, Acquire::Acquired);
        let waited = start.elapsed();
        assert!(
            waited >= Duration::from_secs(9) && waited <= Duration::from_secs(11),
            "waited {waited:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_minimum_spacing_between_calls() {
        let bucket = TokenBucket::with_policy(
            5.0,
            10.0,
            Duration::from_secs(2),
            Duration::from_secs(60),
        );
        let start = Instant::now();
        bucket.acquire().await;
        bucket.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_excessive_wait_is_refused_without_consuming() {
        let bucket = TokenBucket::with_policy(
            1.0,
            0.01,
            Duration::ZERO,
            Duration::from_secs(5),
        );
        assert_eq!(bucket.acquire().await, Acquire::Acquired);

        // Next token is ~100s away, far past the 5s cap.
        let start = Instant::now();
        assert_eq!(bucket.acquire().await, Acquire::Skipped);
        assert!(start.elapsed() < Duration::from_millis(100));

        // The refusal reserved nothing: after a refill the bucket serves
        // exactly one call again.
        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(bucket.acquire().await, Acquire::Acquired);
        assert_eq!(bucket.acquire().await, Acquire::Skipped);
    }
}
