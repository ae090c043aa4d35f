//! Submission rate limiting.
//!
//! A sliding window over the timestamps of accepted submissions. The limiter
//! is shared by every statistic kind: remote writes are the protected
//! resource, not any single table.
//!
//! # Example
//!
//! ```rust
//! use kaos_ranking::ratelimit::{RateLimitConfig, SubmissionRateLimiter};
//! use tokio::time::Instant;
//!
//! let limiter = SubmissionRateLimiter::new(RateLimitConfig::new(2));
//! let now = Instant::now();
//! assert!(limiter.try_acquire(now));
//! assert!(limiter.try_acquire(now));
//! assert!(!limiter.try_acquire(now));
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Rate limit configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum accepted submissions per window
    pub max_submissions: u32,
    /// Window length in seconds
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_submissions: 10,
            window_secs: 60,
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_submissions: u32) -> Self {
        Self {
            max_submissions,
            ..Default::default()
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window_secs = window.as_secs().max(1);
        self
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Result of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether the submission is allowed
    pub allowed: bool,
    /// Remaining submissions in the current window
    pub remaining: u32,
    /// Maximum submissions per window
    pub limit: u32,
    /// Time until the oldest tracked submission leaves the window
    pub retry_after: Duration,
}

/// Sliding-window submission limiter.
pub struct SubmissionRateLimiter {
    config: RateLimitConfig,
    accepted: Mutex<VecDeque<Instant>>,
}

impl SubmissionRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            accepted: Mutex::new(VecDeque::with_capacity(config.max_submissions as usize)),
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Record a submission at `now` if the window has room.
    pub fn try_acquire(&self, now: Instant) -> bool {
        self.check_with_info(now).allowed
    }

    /// Like [`try_acquire`](Self::try_acquire) but reports remaining budget.
    pub fn check_with_info(&self, now: Instant) -> RateLimitResult {
        self.check_many(1, now)
    }

    /// Accept `count` submissions at `now` as a unit, or none of them.
    pub fn check_many(&self, count: u32, now: Instant) -> RateLimitResult {
        let window = self.config.window();
        let limit = self.config.max_submissions;

        let mut accepted = self.accepted.lock();
        evict_expired(&mut accepted, now, window);

        let needed = accepted.len() + count as usize;
        let allowed = needed <= limit as usize;
        if allowed {
            accepted.extend(std::iter::repeat(now).take(count as usize));
        }

        // Wait until enough of the oldest entries leave the window.
        let retry_after = if allowed {
            Duration::ZERO
        } else {
            accepted
                .get(needed - limit as usize - 1)
                .map(|entry| window.saturating_sub(now.saturating_duration_since(*entry)))
                .unwrap_or(window)
        };

        RateLimitResult {
            allowed,
            remaining: limit.saturating_sub(accepted.len() as u32),
            limit,
            retry_after,
        }
    }

    /// Submissions still available at `now`, without consuming any.
    pub fn remaining(&self, now: Instant) -> u32 {
        let mut accepted = self.accepted.lock();
        evict_expired(&mut accepted, now, self.config.window());
        self.config
            .max_submissions
            .saturating_sub(accepted.len() as u32)
    }

    /// Forget all tracked submissions.
    pub fn reset(&self) {
        self.accepted.lock().clear();
    }
}

fn evict_expired(accepted: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = accepted.front() {
        if now.saturating_duration_since(*oldest) >= window {
            accepted.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eleventh_in_window_rejected() {
        let limiter = SubmissionRateLimiter::new(RateLimitConfig::default());
        let start = Instant::now();

        for i in 0..10 {
            assert!(limiter.try_acquire(start + Duration::from_secs(i)));
        }
        assert!(!limiter.try_acquire(start + Duration::from_secs(30)));
    }

    #[test]
    fn test_window_rolls_over() {
        let limiter = SubmissionRateLimiter::new(RateLimitConfig::default());
        let start = Instant::now();

        for _ in 0..10 {
            assert!(limiter.try_acquire(start));
        }
        assert!(!limiter.try_acquire(start + Duration::from_secs(59)));
        assert!(limiter.try_acquire(start + Duration::from_secs(60)));
    }

    #[test]
    fn test_rolling_window_never_exceeds_limit() {
        let limiter = SubmissionRateLimiter::new(RateLimitConfig::default());
        let start = Instant::now();
        let mut accepted = Vec::new();

        // One attempt every 2.5 seconds for five minutes.
        for step in 0..120u64 {
            let now = start + Duration::from_millis(step * 2_500);
            if limiter.try_acquire(now) {
                accepted.push(now);
            }
        }

        for (i, t) in accepted.iter().enumerate() {
            let in_window = accepted[i..]
                .iter()
                .take_while(|other| other.duration_since(*t) < Duration::from_secs(60))
                .count();
            assert!(in_window <= 10);
        }
        assert!(accepted.len() > 10);
    }

    #[test]
    fn test_check_with_info() {
        let limiter = SubmissionRateLimiter::new(RateLimitConfig::new(2));
        let start = Instant::now();

        let first = limiter.check_with_info(start);
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);
        assert_eq!(first.limit, 2);

        limiter.try_acquire(start + Duration::from_secs(10));
        let denied = limiter.check_with_info(start + Duration::from_secs(20));
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.retry_after, Duration::from_secs(40));
    }

    #[test]
    fn test_check_many_is_all_or_nothing() {
        let limiter = SubmissionRateLimiter::new(RateLimitConfig::default());
        let start = Instant::now();

        let first = limiter.check_many(9, start);
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);

        let second = limiter.check_many(9, start + Duration::from_secs(10));
        assert!(!second.allowed);
        assert_eq!(second.remaining, 1);
        // Eight of the first nine must expire, and they all leave together.
        assert_eq!(second.retry_after, Duration::from_secs(50));

        assert!(limiter.check_many(9, start + Duration::from_secs(60)).allowed);
        assert!(!limiter.check_many(11, start + Duration::from_secs(200)).allowed);
    }

    #[test]
    fn test_remaining_and_reset() {
        let limiter = SubmissionRateLimiter::new(RateLimitConfig::new(3));
        let now = Instant::now();
        limiter.try_acquire(now);
        assert_eq!(limiter.remaining(now), 2);
        limiter.reset();
        assert_eq!(limiter.remaining(now), 3);
    }

    #[test]
    fn test_custom_window() {
        let config = RateLimitConfig::new(1).with_window(Duration::from_secs(5));
        let limiter = SubmissionRateLimiter::new(config);
        let now = Instant::now();
        assert!(limiter.try_acquire(now));
        assert!(!limiter.try_acquire(now + Duration::from_secs(4)));
        assert!(limiter.try_acquire(now + Duration::from_secs(5)));
    }
}
