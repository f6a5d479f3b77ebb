//! Bounded retry counter for planned refresh cycles.

/// Counts failed attempts within one refresh cycle.
///
/// `should_retry` is a pure query; callers bump the counter with [`on_next_attempt`]
/// and clear it with [`reset`] once the cycle is over.
///
/// [`on_next_attempt`]: RetryStrategy::on_next_attempt
/// [`reset`]: RetryStrategy::reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryStrategy {
    attempts: u32,
    max_retries: u32,
}

impl RetryStrategy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            attempts: 0,
            max_retries,
        }
    }

    pub fn should_retry(&self) -> bool {
        self.attempts < self.max_retries
    }

    pub fn on_next_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}
