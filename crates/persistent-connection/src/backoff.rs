//! Jittered delay between connection attempts.

use rand::Rng;
use std::time::Duration;

/// A base interval randomized uniformly by a jitter factor on every call.
///
/// The default is 10 seconds ±30%. Randomizing each delay keeps many clients
/// of the same server from reconnecting in lockstep after a shared outage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryDelay {
    base: Duration,
    jitter: f64,
}

impl RetryDelay {
    /// Base interval used by [`RetryDelay::default`].
    pub const DEFAULT_BASE: Duration = Duration::from_secs(10);

    /// Jitter factor used by [`RetryDelay::default`].
    pub const DEFAULT_JITTER: f64 = 0.3;

    /// A delay around `base` with the default ±30% jitter.
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            jitter: Self::DEFAULT_JITTER,
        }
    }

    /// A delay of exactly `base`, with no randomization.
    pub fn fixed(base: Duration) -> Self {
        Self { base, jitter: 0.0 }
    }

    /// Sets the jitter factor, clamped to `0.0..=1.0`.
    ///
    /// A factor of 0.3 spreads delays uniformly over `[0.7 * base, 1.3 * base]`.
    pub fn jitter(mut self, factor: f64) -> Self {
        self.jitter = if factor.is_finite() {
            factor.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    /// The un-randomized interval.
    pub fn base(&self) -> Duration {
        self.base
    }

    /// The configured jitter factor.
    pub fn jitter_factor(&self) -> f64 {
        self.jitter
    }

    /// Smallest and largest delay [`next_delay`](Self::next_delay) can return.
    pub fn bounds(&self) -> (Duration, Duration) {
        let spread = self.base.mul_f64(self.jitter);
        (
            self.base.saturating_sub(spread),
            self.base.saturating_add(spread),
        )
    }

    /// Draws a fresh delay.
    pub fn next_delay(&self) -> Duration {
        let (min, max) = self.bounds();
        if min == max {
            return min;
        }
        let secs = rand::rng().random_range(min.as_secs_f64()..=max.as_secs_f64());
        // Float rounding can land just outside the bounds, or past Duration::MAX.
        Duration::try_from_secs_f64(secs)
            .unwrap_or(max)
            .clamp(min, max)
    }
}

impl Default for RetryDelay {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE)
    }
}
