//! Retry policy for provider calls.
//!
//! The failover adapter retries each provider once with a jittered delay
//! before falling through to the next one. The policy is a plain struct;
//! no retry logic is buried in call sites.

use rand::Rng;
use std::time::Duration;

/// Per-provider retry configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts per provider, including the first.
    pub attempts_per_provider: usize,
    /// Base delay before the retry.
    pub base_delay: Duration,
    /// Whether to add random jitter to the delay.
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn new(attempts_per_provider: usize) -> Self {
        Self {
            attempts_per_provider,
            base_delay: Duration::from_millis(500),
            jitter: true,
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retry number `attempt` (1-based). Jitter scales the
    /// base delay by a random factor in [0.5, 1.5].
    pub fn delay(&self, attempt: usize) -> Duration {
        let base = self.base_delay.as_secs_f64() * attempt as f64;
        if !self.jitter {
            return Duration::from_secs_f64(base);
        }
        let factor = rand::thread_rng().gen_range(0.5..=1.5);
        Duration::from_secs_f64(base * factor)
    }
}

impl Default for RetryPolicy {
    /// One retry per provider.
    fn default() -> Self {
        Self::new(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allows_one_retry() {
        assert_eq!(RetryPolicy::default().attempts_per_provider, 2);
    }

    #[test]
    fn delay_without_jitter_is_deterministic() {
        let policy = RetryPolicy::new(2)
            .with_base_delay(Duration::from_millis(100))
            .with_jitter(false);
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
    }

    #[test]
    fn jitter_stays_in_range() {
        let policy = RetryPolicy::new(2).with_base_delay(Duration::from_millis(100));
        for _ in 0..20 {
            let delay = policy.delay(1).as_secs_f64();
            assert!(delay >= 0.05);
            assert!(delay <= 0.15);
        }
    }
}
