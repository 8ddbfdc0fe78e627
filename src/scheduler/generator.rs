//! Next-ping generation.
//!
//! Pings follow a Poisson process: gaps are exponentially distributed with
//! a configurable mean, so the next ping is unpredictable no matter how
//! long the user has been watching.

use crate::config::ScheduleConfig;
use rand::distributions::Standard;
use rand::rngs::OsRng;
use rand::{CryptoRng, Rng, RngCore};

/// Produces the ping instant that follows `previous`.
///
/// Implementations must return a value strictly greater than `previous`.
pub trait PingGenerator {
    /// Next ping instant (epoch seconds) after `previous`.
    fn next_instant(&mut self, previous: u64, mean_gap_secs: u64) -> u64;
}

/// Exponential gaps drawn from a cryptographically strong source.
pub struct ExponentialGenerator<R = OsRng> {
    rng: R,
}

impl ExponentialGenerator<OsRng> {
    /// Generator backed by operating system entropy.
    #[must_use]
    pub fn new() -> Self {
        Self { rng: OsRng }
    }
}

impl Default for ExponentialGenerator<OsRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RngCore + CryptoRng> ExponentialGenerator<R> {
    /// Generator backed by a caller-supplied CSPRNG (seeded ones make tests reproducible).
    #[must_use]
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Uniform sample on `(0, 1]`.
    fn unit_sample(&mut self) -> f64 {
        let x: f64 = self.rng.sample(Standard);
        1.0 - x
    }
}

impl<R: RngCore + CryptoRng> PingGenerator for ExponentialGenerator<R> {
    fn next_instant(&mut self, previous: u64, mean_gap_secs: u64) -> u64 {
        let gap = exponential_gap(mean_gap_secs, self.unit_sample());
        instant_after(previous, gap)
    }
}

/// Fixed-gap generator used by debug mode.
#[derive(Debug, Clone, Copy)]
pub struct FixedGapGenerator {
    gap_secs: u64,
}

impl FixedGapGenerator {
    /// Every ping lands exactly `gap_secs` after the previous one (minimum 1).
    #[must_use]
    pub fn new(gap_secs: u64) -> Self {
        Self {
            gap_secs: gap_secs.max(1),
        }
    }
}

impl PingGenerator for FixedGapGenerator {
    fn next_instant(&mut self, previous: u64, _mean_gap_secs: u64) -> u64 {
        previous.saturating_add(self.gap_secs)
    }
}

/// Generator selected by configuration.
///
/// Debug mode is only ever an explicit switch; there is no fallback to it.
#[must_use]
pub fn generator_for(config: &ScheduleConfig) -> Box<dyn PingGenerator + Send> {
    if config.debug {
        tracing::warn!(
            gap_secs = config.debug_gap_secs,
            "debug mode: pings use a fixed gap"
        );
        Box::new(FixedGapGenerator::new(config.debug_gap_secs))
    } else {
        Box::new(ExponentialGenerator::new())
    }
}

/// `-mean * ln(u)` for `u` in `(0, 1]`.
#[must_use]
pub fn exponential_gap(mean_gap_secs: u64, u: f64) -> f64 {
    -(mean_gap_secs as f64) * u.ln()
}

/// `round(previous + gap)`, never earlier than `previous + 1`.
#[must_use]
pub fn instant_after(previous: u64, gap: f64) -> u64 {
    // Float-to-int casts saturate, so huge or NaN gaps cannot wrap.
    let rounded = (previous as f64 + gap).round() as u64;
    rounded.max(previous.saturating_add(1))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn exponential_output_is_strictly_increasing() {
        let mut generator = ExponentialGenerator::with_rng(StdRng::seed_from_u64(7));
        let mut previous = 1_700_000_000;
        for _ in 0..10_000 {
            let next = generator.next_instant(previous, 2700);
            assert!(next > previous, "{next} <= {previous}");
            previous = next;
        }
    }

    #[test]
    fn tiny_mean_still_advances() {
        let mut generator = ExponentialGenerator::with_rng(StdRng::seed_from_u64(1));
        for previous in [0, 1, 59, 1_000_000] {
            assert!(generator.next_instant(previous, 1) > previous);
            assert!(generator.next_instant(previous, 0) > previous);
        }
    }

    #[test]
    fn sample_mean_is_close_to_configured_mean() {
        let mut generator = ExponentialGenerator::with_rng(StdRng::seed_from_u64(42));
        let n = 20_000u64;
        let mut previous = 0;
        for _ in 0..n {
            previous = generator.next_instant(previous, 2700);
        }
        let mean = previous as f64 / n as f64;
        assert!((mean - 2700.0).abs() < 2700.0 * 0.05, "sample mean {mean}");
    }

    #[test]
    fn unit_sample_of_one_gives_zero_gap_and_clamps() {
        assert_eq!(exponential_gap(2700, 1.0), 0.0);
        assert_eq!(instant_after(100, 0.0), 101);
        assert_eq!(instant_after(100, 0.4), 101);
    }

    #[test]
    fn gap_is_rounded_to_nearest_second() {
        assert_eq!(instant_after(100, 10.4), 110);
        assert_eq!(instant_after(100, 10.6), 111);
    }

    #[test]
    fn small_unit_sample_gives_large_gap() {
        let gap = exponential_gap(100, f64::MIN_POSITIVE);
        assert!(gap.is_finite());
        assert!(gap > 70_000.0);
    }

    #[test]
    fn non_finite_gap_saturates_instead_of_wrapping() {
        assert_eq!(instant_after(5, f64::INFINITY), u64::MAX);
        assert_eq!(instant_after(5, f64::NAN), 6);
        assert_eq!(instant_after(u64::MAX, 1.0), u64::MAX);
    }

    #[test]
    fn debug_generator_adds_fixed_gap() {
        let mut generator = FixedGapGenerator::new(60);
        for p in [0, 1, 1_700_000_000] {
            assert_eq!(generator.next_instant(p, 2700), p + 60);
            assert_eq!(generator.next_instant(p, 1), p + 60);
        }
    }

    #[test]
    fn generator_for_debug_config_is_deterministic() {
        let config = ScheduleConfig {
            debug: true,
            ..ScheduleConfig::default()
        };
        let mut generator = generator_for(&config);
        assert_eq!(generator.next_instant(1000, 2700), 1060);
    }
}
