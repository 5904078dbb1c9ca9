//! Randomized pacing for scrolls and replayed requests.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::DelayRange;

/// Source of jittered waits and distances.
pub struct Pacer {
    rng: StdRng,
}

impl Pacer {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic pacer, for tests and reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// A wait drawn uniformly from `range`, at millisecond resolution.
    pub fn delay(&mut self, range: DelayRange) -> Duration {
        let min = u64::try_from(range.min.as_millis()).unwrap_or(u64::MAX);
        let max = u64::try_from(range.max.as_millis()).unwrap_or(u64::MAX);
        if max <= min {
            return range.min;
        }
        Duration::from_millis(self.rng.gen_range(min..=max))
    }

    /// Forward scroll step in `[max / 2, max]` pixels.
    pub fn scroll_distance(&mut self, max: u32) -> u32 {
        self.fraction_of(max, 2)
    }

    /// Backward "re-reading" step in `[max / 3, max]` pixels.
    pub fn jiggle_distance(&mut self, max: u32) -> u32 {
        self.fraction_of(max, 3)
    }

    /// True with probability `p` (clamped to `[0, 1]`).
    pub fn chance(&mut self, p: f64) -> bool {
        self.rng.gen_bool(p.clamp(0.0, 1.0))
    }

    fn fraction_of(&mut self, max: u32, divisor: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        let low = (max / divisor).max(1);
        self.rng.gen_range(low..=max)
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new()
    }
}
