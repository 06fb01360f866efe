//! Capped exponential backoff for transient RPC failures.
//!
//! The watcher never gives up on a block — a failed fetch stalls that
//! network's progress but is always retried, so the policy has no attempt
//! limit, only a delay cap.

use std::time::Duration;

use deedstream_core::config::NetworkConfig;

/// Stateless backoff policy — computes the delay for a given attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Cap on exponential growth.
    pub max: Duration,
    /// Multiplier applied per retry.
    pub multiplier: f64,
}

impl RetryPolicy {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            multiplier: 2.0,
        }
    }

    pub fn from_network(cfg: &NetworkConfig) -> Self {
        Self::new(
            Duration::from_millis(cfg.backoff_ms),
            Duration::from_millis(cfg.backoff_max_ms),
        )
    }

    /// Delay before the `attempt`-th retry (1-based). Capped at `max`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base_ms = self.initial.as_millis() as f64
            * self.multiplier.powi(attempt.saturating_sub(1).min(32) as i32);
        let capped = base_ms.min(self.max.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_until_cap() {
        let policy = RetryPolicy::new(Duration::from_millis(100), Duration::from_millis(500));
        assert_eq!(policy.delay(1).as_millis(), 100);
        assert_eq!(policy.delay(2).as_millis(), 200);
        assert_eq!(policy.delay(3).as_millis(), 400);
        assert_eq!(policy.delay(4).as_millis(), 500);
        assert_eq!(policy.delay(40).as_millis(), 500); // exponent clamped, still capped
    }

    #[test]
    fn from_network_config() {
        let cfg = NetworkConfig::new("sepolia", "https://rpc.example.org");
        let policy = RetryPolicy::from_network(&cfg);
        assert_eq!(policy.delay(1).as_millis(), 500);
        assert_eq!(policy.max.as_millis(), 30_000);
    }
}
