//! Randomized politeness delays between requests.

use rand::Rng;
use std::time::Duration;
use tracing::debug;

/// Uniformly random wait between `min` and `max`, spacing out requests so
/// the remote server sees human-ish pacing. A zero range disables the
/// delay (tests).
#[derive(Debug, Clone, Copy)]
pub struct JitterDelay {
    min: Duration,
    max: Duration,
}

impl JitterDelay {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }

    /// No delay at all.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Pick the next wait duration.
    pub fn pick(&self) -> Duration {
        if self.max.is_zero() {
            return Duration::ZERO;
        }
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
    }

    /// Sleep for a jittered duration.
    pub async fn wait(&self) {
        let delay = self.pick();
        if delay.is_zero() {
            return;
        }
        debug!(delay_ms = delay.as_millis() as u64, "Jitter delay");
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_within_bounds() {
        let jitter = JitterDelay::new(Duration::from_millis(100), Duration::from_millis(200));
        for _ in 0..50 {
            let d = jitter.pick();
            assert!(d >= Duration::from_millis(100));
            assert!(d <= Duration::from_millis(200));
        }
    }

    #[test]
    fn test_zero_range() {
        assert!(JitterDelay::none().pick().is_zero());
    }

    #[test]
    fn test_max_clamped_to_min() {
        let jitter = JitterDelay::new(Duration::from_millis(300), Duration::from_millis(100));
        for _ in 0..10 {
            assert!(jitter.pick() >= Duration::from_millis(300));
        }
    }
}
