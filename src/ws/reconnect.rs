#![expect(
    clippy::module_name_repetitions,
    reason = "Scheduler types carry the module name for clarity when re-exported"
)]

use std::time::Duration;

use backoff::backoff::Backoff;

use super::config::ReconnectConfig;

/// Bounded exponential backoff for reconnection attempts.
///
/// The `k`-th attempt waits `min(initial_backoff * 2^(k-1), max_backoff)`. Once
/// `max_attempts` attempts have been handed out, [`Backoff::next_backoff`] returns
/// `None` until the scheduler is [reset](Backoff::reset).
#[derive(Debug, Clone)]
pub struct ReconnectScheduler {
    config: ReconnectConfig,
    attempt: u32,
}

impl ReconnectScheduler {
    #[must_use]
    pub fn new(config: ReconnectConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Number of attempts handed out since the last reset.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.config.max_attempts
    }

    /// Delay for the given 1-based attempt number.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let cap = self.config.max_backoff;
        1_u32
            .checked_shl(attempt.saturating_sub(1))
            .and_then(|factor| self.config.initial_backoff.checked_mul(factor))
            .map_or(cap, |delay| delay.min(cap))
    }
}

impl Backoff for ReconnectScheduler {
    fn reset(&mut self) {
        self.attempt = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.attempt += 1;
        Some(self.delay_for(self.attempt))
    }
}
