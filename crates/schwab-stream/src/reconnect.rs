//! When the streamer connection retries, and how long it waits
//!
//! Only transport failures are retried: refused or timed-out connects,
//! dropped sockets and heartbeat silence. A rejected LOGIN or a notice that
//! ends the session stops the loop, since logging straight back in would
//! fight whichever session replaced this one.

use rand::Rng;
use schwab_types::SchwabError;
use std::time::Duration;

/// Retry policy for the streamer connection
///
/// The wait doubles from `initial_delay` on each consecutive failure up to
/// `max_delay`, spread by `jitter`. A successful LOGIN starts the count
/// over.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Fraction of the wait added or removed at random, 0.0 to 1.0
    pub jitter: f64,
    /// Consecutive failures tolerated; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: 0.2,
            max_attempts: None,
        }
    }
}

impl ReconnectConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = Some(max);
        self
    }

    /// Never retry
    pub fn disabled() -> Self {
        Self::default().with_max_attempts(0)
    }

    /// Wait before retry number `attempt` (1-based) after `error`
    ///
    /// `None` means the connection loop should give up and return the
    /// error.
    pub fn retry_delay(&self, attempt: u32, error: &SchwabError) -> Option<Duration> {
        if !error.is_retryable() {
            return None;
        }
        if self.max_attempts.is_some_and(|max| attempt > max) {
            return None;
        }
        Some(self.spread(self.backoff(attempt)))
    }

    /// Doubling wait without jitter, capped at `max_delay`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(31);
        self.initial_delay
            .saturating_mul(1u32 << doublings)
            .min(self.max_delay)
    }

    fn spread(&self, base: Duration) -> Duration {
        if self.jitter <= 0.0 || base.is_zero() {
            return base;
        }
        let factor = rand::thread_rng().gen_range(1.0 - self.jitter..=1.0 + self.jitter);
        base.mul_f64(factor)
    }
}
