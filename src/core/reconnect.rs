use std::time::Duration;

use rand::{Rng, SeedableRng, rngs::SmallRng};

/// Reconnect policy consulted on every entry into `Reconnecting`.
pub trait ReconnectStrategy: Send + Sync + 'static {
    /// Count a new attempt and return the delay before it, or `None` once the attempt budget
    /// is spent.
    fn next_delay(&mut self) -> Option<Duration>;
    /// Called on every successful open and on manual `connect()`.
    fn reset(&mut self);
    /// Attempts made since the last reset.
    fn attempts(&self) -> u32;
}

/// Bounded exponential backoff: `min(base * factor^(n-1), max)` for attempt `n`.
#[derive(Clone, Debug)]
pub struct ExponentialBackoffReconnect {
    base: Duration,
    max: Duration,
    factor: f64,
    max_attempts: u32,
    attempts: u32,
    jitter: bool,
}

impl ExponentialBackoffReconnect {
    pub fn new(base: Duration, max: Duration, factor: f64, max_attempts: u32) -> Self {
        let factor = if factor.is_finite() && factor >= 1.0 {
            factor
        } else {
            1.5
        };
        Self {
            base,
            max: max.max(base),
            factor,
            max_attempts,
            attempts: 0,
            jitter: false,
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Un-jittered delay before attempt `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base.as_secs_f64() * self.factor.powi(exponent);
        let capped = secs.min(self.max.as_secs_f64());
        Duration::from_secs_f64(capped)
    }
}

impl Default for ExponentialBackoffReconnect {
    fn default() -> Self {
        Self::new(Duration::from_secs(3), Duration::from_secs(30), 1.5, 5)
    }
}

impl ReconnectStrategy for ExponentialBackoffReconnect {
    fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;
        let delay = self.delay_for_attempt(self.attempts);
        Some(if self.jitter {
            jitter_delay(delay)
        } else {
            delay
        })
    }

    fn reset(&mut self) {
        self.attempts = 0;
    }

    fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Scale `base` by a random factor in `[0.5, 1.0]`.
pub fn jitter_delay(base: Duration) -> Duration {
    if base.is_zero() {
        return base;
    }

    let mut rng = SmallRng::from_entropy();
    let jitter: f64 = rng.gen_range(0.5..=1.0);
    let nanos = (base.as_nanos() as f64 * jitter) as u128;
    Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
}
