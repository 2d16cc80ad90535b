//! Monte Carlo Uncertainty Propagation
//!
//! ## Overview
//!
//! Base+top is the one mode with two independent noisy angle measurements,
//! and its `tan()` nonlinearity makes closed-form error propagation
//! misleading: near steep angles the output error distribution is
//! asymmetric and heavy-tailed, which a linearized estimate would flatten
//! into a symmetric band. So the estimator samples instead.
//!
//! Each trial draws a perturbed `(base, top)` pair from normal
//! distributions centered at the captured medians with the captured
//! standard deviations, runs the raw base+top formula, and discards
//! non-finite outcomes. The empirical 10th and 90th percentiles of the
//! surviving heights are reported alongside the unperturbed point
//! estimate.
//!
//! ## Determinism
//!
//! Draws come from a seeded linear congruential generator plus a
//! Box-Muller transform - no platform entropy, identical results for an
//! identical seed, and no heap allocation. Sessions that want varied
//! sequences seed from a timestamp.

use heapless::Vec;

use crate::{
    constants::{
        DEFAULT_ANGLE_SD_RAD, MC_DEFAULT_TRIALS, MC_MAX_TRIALS, PERCENTILE_HIGH, PERCENTILE_LOW,
    },
    errors::MeasureResult,
    geometry::{self, GeometryConfig, HeightEstimate, PercentileRange},
    window::CapturedAngle,
};

/// Deterministic Gaussian sampler (LCG + Box-Muller)
#[derive(Debug, Clone)]
pub struct GaussianSampler {
    seed: u32,
}

impl GaussianSampler {
    /// Create a sampler from a seed. Zero is remapped to a fixed
    /// constant so the LCG never locks onto a degenerate orbit.
    pub fn new(seed: u32) -> Self {
        Self {
            seed: if seed == 0 { 0x1234_5678 } else { seed },
        }
    }

    /// Uniform draw in (0, 1)
    fn next_uniform(&mut self) -> f32 {
        self.seed = self.seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        // Keep strictly inside (0, 1) so ln() below stays finite
        let u = (self.seed >> 8) as f32 / 16_777_216.0;
        u.max(1e-7)
    }

    /// Standard normal draw via the Box-Muller transform
    pub fn next_standard_normal(&mut self) -> f32 {
        let u1 = self.next_uniform();
        let u2 = self.next_uniform();
        libm::sqrtf(-2.0 * libm::logf(u1)) * libm::cosf(2.0 * core::f32::consts::PI * u2)
    }

    /// Normal draw with the given mean and standard deviation
    pub fn next_normal(&mut self, mean: f32, std_dev: f32) -> f32 {
        mean + std_dev * self.next_standard_normal()
    }
}

/// Monte Carlo policy
#[derive(Debug, Clone)]
pub struct MonteCarloConfig {
    /// Number of perturbed trials to run
    pub trials: usize,
    /// Angle standard deviation assumed when a capture reports none (radians)
    pub default_sd_rad: f32,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            trials: MC_DEFAULT_TRIALS,
            default_sd_rad: DEFAULT_ANGLE_SD_RAD,
        }
    }
}

impl MonteCarloConfig {
    /// Set the trial count (clamped to the buffer capacity)
    pub fn with_trials(mut self, trials: usize) -> Self {
        self.trials = trials.min(MC_MAX_TRIALS);
        self
    }
}

/// Point estimate plus empirical p10/p90 range for a base+top capture.
///
/// The point estimate goes through the *checked* solver, so validity
/// rejections propagate to the caller before any sampling happens.
/// Perturbed trials use the raw formula and non-finite outcomes are
/// simply discarded; if too few trials survive to say anything about the
/// tails, the range is omitted rather than fabricated.
pub fn base_top_estimate(
    eye_height_m: f32,
    base: &CapturedAngle,
    top: &CapturedAngle,
    geometry_config: &GeometryConfig,
    config: &MonteCarloConfig,
    rng: &mut GaussianSampler,
) -> MeasureResult<HeightEstimate> {
    let point =
        geometry::base_top_height(eye_height_m, base.median_rad, top.median_rad, geometry_config)?;

    let base_sd = effective_sd(base.std_dev_rad, config.default_sd_rad);
    let top_sd = effective_sd(top.std_dev_rad, config.default_sd_rad);

    let mut heights: Vec<f32, MC_MAX_TRIALS> = Vec::new();
    let trials = config.trials.min(MC_MAX_TRIALS);
    for _ in 0..trials {
        let b = rng.next_normal(base.median_rad, base_sd);
        let t = rng.next_normal(top.median_rad, top_sd);
        let h = geometry::base_top_height_unchecked(eye_height_m, b, t);
        if h.is_finite() {
            // Capacity equals the trial cap, push cannot fail
            let _ = heights.push(h);
        }
    }

    // A thin surviving set cannot support a tail estimate
    const MIN_SURVIVORS: usize = 20;
    if heights.len() < MIN_SURVIVORS {
        return Ok(HeightEstimate::point(point));
    }

    heights.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(core::cmp::Ordering::Equal));

    let p10 = percentile(&heights, PERCENTILE_LOW);
    let p90 = percentile(&heights, PERCENTILE_HIGH);
    // Half the central 80% band, as a symmetric spread figure
    let uncertainty_m = 0.5 * (p90 - p10);

    Ok(HeightEstimate {
        height_m: point,
        uncertainty_m: Some(uncertainty_m),
        percentile_range: Some(PercentileRange { p10, p90 }),
    })
}

fn effective_sd(captured_sd: f32, default_sd: f32) -> f32 {
    if captured_sd > 0.0 {
        captured_sd
    } else {
        default_sd
    }
}

/// Nearest-rank percentile of an already-sorted slice
fn percentile(sorted: &[f32], p: f32) -> f32 {
    let n = sorted.len();
    let idx = ((n - 1) as f32 * p + 0.5) as usize;
    sorted[idx.min(n - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::RAD_PER_DEG;
    use crate::errors::{GeometryReason, MeasureError};

    fn capture(deg: f32, sd_deg: f32) -> CapturedAngle {
        CapturedAngle {
            median_rad: deg * RAD_PER_DEG,
            std_dev_rad: sd_deg * RAD_PER_DEG,
            roll_at_capture_rad: 0.0,
        }
    }

    #[test]
    fn sampler_is_deterministic() {
        let mut a = GaussianSampler::new(7);
        let mut b = GaussianSampler::new(7);
        for _ in 0..100 {
            assert_eq!(a.next_standard_normal(), b.next_standard_normal());
        }
    }

    #[test]
    fn standard_normal_moments_are_plausible() {
        let mut rng = GaussianSampler::new(42);
        let n = 4000;
        let mut sum = 0.0_f32;
        let mut sq_sum = 0.0_f32;
        for _ in 0..n {
            let x = rng.next_standard_normal();
            sum += x;
            sq_sum += x * x;
        }
        let mean = sum / n as f32;
        let variance = sq_sum / n as f32 - mean * mean;

        assert!(mean.abs() < 0.1, "mean {}", mean);
        assert!((variance - 1.0).abs() < 0.15, "variance {}", variance);
    }

    #[test]
    fn range_brackets_the_point_estimate() {
        let mut rng = GaussianSampler::new(1);
        let estimate = base_top_estimate(
            1.7,
            &capture(-15.0, 0.4),
            &capture(35.0, 0.4),
            &GeometryConfig::default(),
            &MonteCarloConfig::default(),
            &mut rng,
        )
        .unwrap();

        let range = estimate.percentile_range.expect("range expected");
        assert!(range.p10 < estimate.height_m);
        assert!(range.p90 > estimate.height_m);
        assert!(range.p10 < range.p90);
        assert!(estimate.uncertainty_m.unwrap() > 0.0);
    }

    #[test]
    fn wider_angle_noise_widens_the_range() {
        let narrow = {
            let mut rng = GaussianSampler::new(9);
            base_top_estimate(
                1.7,
                &capture(-15.0, 0.1),
                &capture(35.0, 0.1),
                &GeometryConfig::default(),
                &MonteCarloConfig::default(),
                &mut rng,
            )
            .unwrap()
        };
        let wide = {
            let mut rng = GaussianSampler::new(9);
            base_top_estimate(
                1.7,
                &capture(-15.0, 0.8),
                &capture(35.0, 0.8),
                &GeometryConfig::default(),
                &MonteCarloConfig::default(),
                &mut rng,
            )
            .unwrap()
        };

        let narrow_span = {
            let r = narrow.percentile_range.unwrap();
            r.p90 - r.p10
        };
        let wide_span = {
            let r = wide.percentile_range.unwrap();
            r.p90 - r.p10
        };
        assert!(wide_span > narrow_span);
    }

    #[test]
    fn zero_sd_falls_back_to_default() {
        let mut rng = GaussianSampler::new(3);
        let estimate = base_top_estimate(
            1.7,
            &capture(-15.0, 0.0),
            &capture(35.0, 0.0),
            &GeometryConfig::default(),
            &MonteCarloConfig::default(),
            &mut rng,
        )
        .unwrap();

        // Default jitter still produces a nonzero spread
        let range = estimate.percentile_range.unwrap();
        assert!(range.p90 - range.p10 > 0.0);
    }

    #[test]
    fn invalid_geometry_propagates_before_sampling() {
        let mut rng = GaussianSampler::new(5);
        let result = base_top_estimate(
            1.7,
            &capture(-1.0, 0.2),
            &capture(35.0, 0.2),
            &GeometryConfig::default(),
            &MonteCarloConfig::default(),
            &mut rng,
        );
        assert!(matches!(
            result,
            Err(MeasureError::GeometryInvalid {
                reason: GeometryReason::TooShallow
            })
        ));
    }
}
