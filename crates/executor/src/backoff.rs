//! Retry delay computation
//!
//! Precedence when a conflict is retried:
//! 1. the server's hint, capped at `max_backoff`
//! 2. the configured fixed `default_retry_delay`
//! 3. `initial_backoff * 2^attempt` plus jitter, capped at `max_backoff`

use chrono::{DateTime, Utc};
use rand::Rng;
use spool_core::clock::add_duration;
use spool_core::{RetryConfig, RetryDelay};
use std::time::Duration;

/// Progress of one retrying invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    /// Attempts started so far
    pub attempt: u32,
    /// Absolute deadline, if the invocation has one
    pub deadline: Option<DateTime<Utc>>,
    /// Delay computed for the most recent conflict
    pub last_delay: Option<Duration>,
}

impl RetryState {
    /// State for an invocation entered at `started`
    pub fn new(started: DateTime<Utc>, timeout: Option<Duration>) -> Self {
        Self {
            attempt: 0,
            deadline: timeout.map(|t| add_duration(started, t)),
            last_delay: None,
        }
    }

    /// Whether `now` is at or past the deadline
    pub fn expired_at(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Whether sleeping `delay` from `now` would overshoot the deadline
    pub fn overshoots(&self, now: DateTime<Utc>, delay: Duration) -> bool {
        self.deadline
            .is_some_and(|deadline| add_duration(now, delay) > deadline)
    }
}

/// Delay before retrying after conflict number `attempt` (1-based)
pub fn retry_delay(config: &RetryConfig, hint: Option<RetryDelay>, attempt: u32) -> Duration {
    if let Some(hint) = hint {
        return hint.to_duration().min(config.max_backoff());
    }
    if let Some(delay) = config.default_retry_delay() {
        return delay;
    }

    // Cap the shift so the multiplier cannot overflow
    let multiplier = 1u32 << attempt.min(31);
    let mut delay = config.initial_backoff().saturating_mul(multiplier);
    if config.jitter {
        delay = delay.saturating_add(jitter(config.initial_backoff()));
    }
    delay.min(config.max_backoff())
}

/// Uniform in `[0, bound)`
fn jitter(bound: Duration) -> Duration {
    let nanos = u64::try_from(bound.as_nanos()).unwrap_or(u64::MAX);
    if nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rand::thread_rng().gen_range(0..nanos))
}
