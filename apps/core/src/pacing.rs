//! Timing bounds and random pacing.
//!
//! Every delay the engine sleeps on is drawn from a [`Bounds`] pair that has
//! been clamped into a safe range first, so a bad script or operator input can
//! never stall a conversation for longer than a minute per suspension point.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lower bound for the continuous-mode interval.
pub const MIN_INTERVAL_MS: u64 = 2_000;
/// Upper bound for the continuous-mode interval.
pub const MAX_INTERVAL_MS: u64 = 60_000;
/// Upper bound for any per-message delay or jitter.
pub const MAX_DELAY_MS: u64 = 60_000;
/// Jitter applied before each continuous-mode emission.
pub const CONTINUOUS_JITTER: Bounds = Bounds { min: 0, max: 250 };

/// An inclusive `[min, max]` range of milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: u64,
    pub max: u64,
}

impl Bounds {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    /// Clamps both ends to `[0, MAX_DELAY_MS]` and swaps them if inverted.
    pub fn clamped(self) -> Self {
        let min = clamp_delay(self.min);
        let max = clamp_delay(self.max);
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// Draws a uniformly distributed value from the clamped range.
    pub fn sample<R: Rng + ?Sized>(self, rng: &mut R) -> u64 {
        let Bounds { min, max } = self.clamped();
        if min == max {
            min
        } else {
            rng.gen_range(min..=max)
        }
    }

    /// Draws a random duration using the thread-local generator.
    pub fn random_duration(self) -> Duration {
        Duration::from_millis(self.sample(&mut rand::thread_rng()))
    }
}

/// Clamps a continuous-mode interval into `[MIN_INTERVAL_MS, MAX_INTERVAL_MS]`.
pub fn clamp_interval(interval_ms: u64) -> u64 {
    interval_ms.clamp(MIN_INTERVAL_MS, MAX_INTERVAL_MS)
}

/// Clamps a single delay value into `[0, MAX_DELAY_MS]`.
pub fn clamp_delay(delay_ms: u64) -> u64 {
    delay_ms.min(MAX_DELAY_MS)
}

/// Merges explicit run options over script defaults, then clamps.
pub fn effective_delay(defaults: Bounds, min: Option<u64>, max: Option<u64>) -> Bounds {
    Bounds {
        min: min.unwrap_or(defaults.min),
        max: max.unwrap_or(defaults.max),
    }
    .clamped()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_clamp_interval_range_and_idempotence() {
        for x in [0, 1, 1_999, 2_000, 5_000, 60_000, 60_001, u64::MAX] {
            let c = clamp_interval(x);
            assert!((MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&c), "{} -> {}", x, c);
            assert_eq!(clamp_interval(c), c);
        }
    }

    #[test]
    fn test_sample_stays_within_clamped_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let cases = [
            Bounds::new(0, 0),
            Bounds::new(100, 200),
            Bounds::new(500, 90_000),
            Bounds::new(70_000, 80_000),
            Bounds::new(300, 100),
        ];
        for bounds in cases {
            let clamped = bounds.clamped();
            for _ in 0..200 {
                let v = bounds.sample(&mut rng);
                assert!(v >= clamped.min && v <= clamped.max, "{:?} drew {}", bounds, v);
                assert!(v <= MAX_DELAY_MS);
            }
        }
    }

    #[test]
    fn test_effective_delay_prefers_explicit_options() {
        let defaults = Bounds::new(800, 2_000);
        assert_eq!(effective_delay(defaults, None, None), defaults);
        assert_eq!(effective_delay(defaults, Some(10), None), Bounds::new(10, 2_000));
        assert_eq!(
            effective_delay(defaults, Some(0), Some(120_000)),
            Bounds::new(0, MAX_DELAY_MS)
        );
    }
}
