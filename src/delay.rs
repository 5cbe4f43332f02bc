use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::DelayRange;

/// Source of randomized pauses.
///
/// Samples are drawn uniformly from a [`DelayRange`] in whole nanoseconds, so
/// both bounds are reachable and nothing falls outside them.
#[derive(Debug, Clone)]
pub struct DelayModel<R = StdRng> {
    rng: R,
}

impl DelayModel<StdRng> {
    /// Reproducible delays for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl<R: Rng> DelayModel<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    pub fn sample(&mut self, range: &DelayRange) -> Duration {
        let lo = range.min().as_nanos();
        let hi = range.max().as_nanos();
        if lo >= hi {
            return range.min();
        }
        // u64 nanoseconds covers ~584 years
        let lo = u64::try_from(lo).unwrap_or(u64::MAX);
        let hi = u64::try_from(hi).unwrap_or(u64::MAX);
        Duration::from_nanos(self.rng.gen_range(lo..=hi))
    }
}
