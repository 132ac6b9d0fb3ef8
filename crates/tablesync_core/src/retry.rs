use std::time::Duration;

/// Backoff schedule for resubmitting unprocessed batch items.
///
/// The provider signals throttling by returning a subset of items as
/// unprocessed rather than failing the call, so the writer retries that
/// subset with exponentially growing, jittered delays and gives up after
/// `max_attempts` resubmissions.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of resubmissions before the chunk is declared failed.
    pub max_attempts: usize,

    /// Delay before the first resubmission.
    pub initial_delay: Duration,

    /// Ceiling for the exponential backoff.
    pub max_delay: Duration,

    /// Multiplier applied per attempt (2.0 doubles the delay each time).
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// Fast-fail schedule for tests.
    pub fn testing() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            backoff_factor: 2.0,
        }
    }

    /// Delay before resubmission `attempt` (1-indexed). `jitter` in
    /// [0.0, 1.0] scales the nominal delay into [50%, 100%] so callers
    /// control randomness and tests stay deterministic.
    pub fn delay_for_attempt(&self, attempt: usize, jitter: f64) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as usize) as i32;
        let multiplier = self.backoff_factor.powi(exponent);
        let nominal = self
            .initial_delay
            .mul_f64(multiplier)
            .min(self.max_delay);
        nominal.mul_f64(0.5 + 0.5 * jitter.clamp(0.0, 1.0))
    }
}
