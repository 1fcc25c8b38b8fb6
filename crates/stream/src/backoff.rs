use std::time::Duration;

pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1_000);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);
pub const DEFAULT_ATTEMPT_CAP: u32 = 6;

/// Exponential reconnect backoff, recomputed as a value on every failure.
///
/// The delay for the current attempt is `min(base * 2^attempt, max)`; the
/// attempt counter saturates at `cap`, so the delay plateaus once the doubled
/// value passes `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub attempt: u32,
    pub cap: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, DEFAULT_ATTEMPT_CAP)
    }
}

impl BackoffPolicy {
    pub const fn new(base_delay: Duration, max_delay: Duration, cap: u32) -> Self {
        Self {
            attempt: 0,
            cap,
            base_delay,
            max_delay,
        }
    }

    /// Delay to wait before the reconnect scheduled at the current attempt.
    pub fn delay(&self) -> Duration {
        let multiplier = 2_u32.saturating_pow(self.attempt.min(self.cap));
        self.base_delay
            .checked_mul(multiplier)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Returns the delay for this failure together with the policy for the next one.
    pub fn advance(self) -> (Duration, Self) {
        let delay = self.delay();
        let next = Self {
            attempt: self.attempt.saturating_add(1).min(self.cap),
            ..self
        };
        (delay, next)
    }

    /// Policy after a successful open.
    pub fn reset(self) -> Self {
        Self { attempt: 0, ..self }
    }
}
