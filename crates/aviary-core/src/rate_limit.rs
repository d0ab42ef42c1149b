//! Sliding-window rate limiter, shared between the push-provider-level
//! limiter and the `rate_limit` middleware stage.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Allow `max_events` within any `window_secs`-long sliding window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub max_events: u32,
    pub window_secs: u64,
}

/// Per-key sliding-window state. One instance guards one rate-limited
/// subject (a push provider, or an account/provider pair in the middleware
/// stage).
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    events: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            events: VecDeque::new(),
        }
    }

    fn evict_outside_window(&mut self, now: Instant) {
        let window = Duration::from_secs(self.config.window_secs);
        while let Some(&front) = self.events.front() {
            if now.duration_since(front) >= window {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }

    /// Returns `Ok(())` and records the event if under the limit, otherwise
    /// `Err(retry_after)` with the duration until the oldest event expires.
    pub fn try_acquire(&mut self, now: Instant) -> Result<(), Duration> {
        self.evict_outside_window(now);
        if self.events.len() >= self.config.max_events as usize {
            let window = Duration::from_secs(self.config.window_secs);
            let oldest = *self.events.front().expect("non-empty at capacity");
            let retry_after = window.saturating_sub(now.duration_since(oldest));
            return Err(retry_after);
        }
        self.events.push_back(now);
        Ok(())
    }

    pub fn current_count(&mut self, now: Instant) -> usize {
        self.evict_outside_window(now);
        self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_events_up_to_max_in_window() {
        let mut limiter = RateLimiter::new(RateLimitConfig {
            max_events: 2,
            window_secs: 60,
        });
        let t0 = Instant::now();
        assert!(limiter.try_acquire(t0).is_ok());
        assert!(limiter.try_acquire(t0).is_ok());
        assert!(limiter.try_acquire(t0).is_err());
    }

    #[test]
    fn window_slides_and_frees_capacity() {
        let mut limiter = RateLimiter::new(RateLimitConfig {
            max_events: 1,
            window_secs: 1,
        });
        let t0 = Instant::now();
        assert!(limiter.try_acquire(t0).is_ok());
        assert!(limiter.try_acquire(t0).is_err());

        let t1 = t0 + Duration::from_secs(2);
        assert!(limiter.try_acquire(t1).is_ok());
    }

    #[test]
    fn retry_after_reflects_remaining_window() {
        let mut limiter = RateLimiter::new(RateLimitConfig {
            max_events: 1,
            window_secs: 10,
        });
        let t0 = Instant::now();
        limiter.try_acquire(t0).unwrap();
        let err = limiter.try_acquire(t0 + Duration::from_secs(4)).unwrap_err();
        assert!(err <= Duration::from_secs(6) && err > Duration::from_secs(5));
    }
}
