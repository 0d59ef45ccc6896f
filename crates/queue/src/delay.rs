use std::time::Duration;

use rand::Rng;

/// Pause a worker takes after each item before looking at the queue again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayPolicy {
    Fixed(Duration),
    /// Uniformly random in `[min, max)`, so bursts from several clients
    /// don't line up.
    Uniform { min: Duration, max: Duration },
}

impl DelayPolicy {
    #[must_use]
    pub fn fixed_ms(ms: u64) -> Self {
        Self::Fixed(Duration::from_millis(ms))
    }

    #[must_use]
    pub fn uniform_ms(min_ms: u64, max_ms: u64) -> Self {
        Self::Uniform {
            min: Duration::from_millis(min_ms),
            max: Duration::from_millis(max_ms),
        }
    }

    /// Draw the next delay.
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Uniform { min, max } if min < max => rand::rng().random_range(min..max),
            Self::Uniform { min, .. } => min,
        }
    }
}
