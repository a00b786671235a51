use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential backoff with symmetric jitter.
///
/// Stateless: the delay is a pure function of the retry count, so the policy
/// can be shared freely across tasks.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RetryPolicy {
    pub base_delay_ms: u64,
    pub factor: f64,
    pub jitter_fraction: f64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            factor: 2.0,
            jitter_fraction: 0.2,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry attempt `n` (1-based):
    /// `clamp(base * factor^(n-1) * (1 +/- jitter * uniform[0,1)), 0, max)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let raw = self.base_delay_ms as f64 * self.factor.powi(attempt as i32 - 1);
        let multiplier = if self.jitter_fraction > 0.0 {
            1.0 + self.jitter_fraction * rand::rng().random_range(-1.0..1.0)
        } else {
            1.0
        };
        let delayed = (raw * multiplier).clamp(0.0, self.max_delay_ms as f64);
        Duration::from_millis(delayed as u64)
    }
}
