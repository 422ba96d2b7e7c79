use std::time::Duration;

use backoff::backoff::Backoff;

/// Linear reconnect schedule: the n-th retry waits `base_delay * n`, and the
/// schedule gives up after `max_attempts` retries.
///
/// Implements [`Backoff`] so the socket task can drive it the same way it
/// would drive an `ExponentialBackoff`.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
            attempts: 0,
        }
    }

    /// Retries handed out since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Backoff for ReconnectPolicy {
    fn reset(&mut self) {
        self.attempts = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some(
            self.base_delay
                .checked_mul(self.attempts)
                .unwrap_or(Duration::MAX),
        )
    }
}
