//! Scalar Kalman Fusion of Vision and Sensor Height Estimates
//!
//! ## Overview
//!
//! Two independently noisy estimates of the same standing height - one
//! from the vision collaborator (boundary detection plus pixel
//! calibration), one from the tilt-sensor geometry - are recursively
//! combined into a single lower-variance estimate.
//!
//! Per fusion call:
//!
//! 1. **Weighting** - rule-based on vision confidence, not learned:
//!    above 85% vision dominates (0.7/0.3), between 70% and 85% the blend
//!    is even (0.5/0.5), below 70% the sensor dominates (0.3/0.7). A
//!    missing input hands its weight to the other.
//! 2. **Noise inference** - an explicit standard deviation wins;
//!    otherwise `sd = sd_base·(0.4 + (1 - c)·0.6)`, shrinking toward 40%
//!    of the baseline as confidence approaches 1.
//! 3. **Pseudo-measurement** - `z = Σwᵢhᵢ / Σwᵢ` with variance
//!    `R = Σwᵢ²·varᵢ` (weights normalized).
//! 4. **Predict** - `P' = P + Q`: the true height is constant, but Q
//!    lets the filter slowly re-estimate between calls.
//! 5. **Update** - `K = P'/(P' + R)`; on the very first call the state
//!    initializes to the measurement (`estimate = z`, `P = R`).
//!
//! The filter is stateful per measurement session and owned by the
//! caller - starting a new target constructs (or resets) a fresh filter,
//! so no estimate leaks across sessions. Calling with only one input
//! present is graceful degradation, not an error; calling with neither
//! returns a sentinel (NaN height, zero confidence) since fusion may be
//! invoked speculatively on every tick.

use crate::constants::{
    FUSION_BASELINE_SD_M, FUSION_HIGH_CONFIDENCE_PCT, FUSION_LOW_CONFIDENCE_PCT,
    FUSION_PROCESS_SD_M, FUSION_WEIGHT_VISION_HIGH, FUSION_WEIGHT_VISION_LOW,
    FUSION_WEIGHT_VISION_MID,
};

/// Confidence score in range [0, 1]
///
/// Internally stored as fixed-point for determinism across platforms.
/// 0.0 = no confidence, 1.0 = full confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConfidenceScore {
    /// Fixed-point representation (0-65535 maps to 0.0-1.0)
    value: u16,
}

impl ConfidenceScore {
    /// No confidence (0%)
    pub const ZERO: Self = Self { value: 0 };

    /// Moderate confidence (50%)
    pub const MODERATE: Self = Self { value: 32768 };

    /// Full confidence (100%)
    pub const MAX: Self = Self { value: 65535 };

    /// Create from floating point value, clamped to [0, 1]
    pub fn from_float(confidence: f32) -> Self {
        let clamped = confidence.clamp(0.0, 1.0);
        Self {
            value: (clamped * 65535.0) as u16,
        }
    }

    /// Convert to floating point [0, 1]
    pub fn as_float(&self) -> f32 {
        self.value as f32 / 65535.0
    }

    /// Get raw fixed-point value
    pub fn value(&self) -> u16 {
        self.value
    }
}

impl Default for ConfidenceScore {
    fn default() -> Self {
        Self::MODERATE
    }
}

/// Height estimate from the vision collaborator
#[derive(Debug, Clone, Copy)]
pub struct VisionEstimate {
    /// Estimated height in meters
    pub height_m: f32,
    /// Detection confidence
    pub confidence: ConfidenceScore,
    /// Explicit measurement standard deviation, when known (meters)
    pub std_dev_m: Option<f32>,
}

/// Height estimate from the tilt-sensor geometry
#[derive(Debug, Clone, Copy)]
pub struct SensorEstimate {
    /// Estimated height in meters
    pub height_m: f32,
    /// Explicit measurement standard deviation, when known (meters)
    pub std_dev_m: Option<f32>,
}

/// Fusion policy knobs
#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// Baseline measurement SD when an estimate carries none (meters)
    pub baseline_sd_m: f32,
    /// Process noise SD injected between updates (meters)
    pub process_sd_m: f32,
    /// Vision confidence (percent) above which vision dominates
    pub high_confidence_pct: f32,
    /// Vision confidence (percent) below which the sensor dominates
    pub low_confidence_pct: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            baseline_sd_m: FUSION_BASELINE_SD_M,
            process_sd_m: FUSION_PROCESS_SD_M,
            high_confidence_pct: FUSION_HIGH_CONFIDENCE_PCT,
            low_confidence_pct: FUSION_LOW_CONFIDENCE_PCT,
        }
    }
}

impl FusionConfig {
    /// Set the baseline measurement standard deviation
    pub fn with_baseline_sd(mut self, sd_m: f32) -> Self {
        self.baseline_sd_m = sd_m;
        self
    }

    /// Set the process noise standard deviation
    pub fn with_process_sd(mut self, sd_m: f32) -> Self {
        self.process_sd_m = sd_m;
        self
    }
}

/// Recursive filter state, one per measurement session
#[derive(Debug, Clone, Copy)]
struct FusionState {
    /// Current height estimate; `None` before the first update
    estimate_m: Option<f32>,
    /// Estimation error variance (m²)
    variance_m2: f32,
}

/// Result of one fusion call
#[derive(Debug, Clone, Copy)]
pub struct FusionOutput {
    /// Fused height in meters; NaN when no input was available
    pub height_m: f32,
    /// Standard deviation of the fused estimate (meters)
    pub std_dev_m: f32,
    /// Combined output confidence
    pub confidence: ConfidenceScore,
}

impl FusionOutput {
    /// True for the no-input sentinel
    pub fn is_empty(&self) -> bool {
        !self.height_m.is_finite()
    }

    fn empty() -> Self {
        Self {
            height_m: f32::NAN,
            std_dev_m: f32::NAN,
            confidence: ConfidenceScore::ZERO,
        }
    }
}

/// Scalar Kalman filter over vision and sensor height estimates
pub struct HeightFusion {
    config: FusionConfig,
    state: FusionState,
}

impl HeightFusion {
    /// Fresh filter with the given policy
    pub fn new(config: FusionConfig) -> Self {
        Self {
            config,
            state: FusionState {
                estimate_m: None,
                variance_m2: 0.0,
            },
        }
    }

    /// Fresh filter with default policy
    pub fn with_defaults() -> Self {
        Self::new(FusionConfig::default())
    }

    /// Current estimate, if any update has happened
    pub fn estimate_m(&self) -> Option<f32> {
        self.state.estimate_m
    }

    /// Current estimation error variance (m²)
    pub fn variance_m2(&self) -> f32 {
        self.state.variance_m2
    }

    /// Discard state for a new target object
    pub fn reset(&mut self) {
        self.state = FusionState {
            estimate_m: None,
            variance_m2: 0.0,
        };
        #[cfg(feature = "log")]
        log::debug!("fusion state reset");
    }

    /// Fuse the available estimates into the running state.
    ///
    /// Either input may be absent; with neither present the sentinel
    /// output (NaN height, zero confidence) is returned and the state is
    /// left untouched.
    pub fn fuse(
        &mut self,
        vision: Option<&VisionEstimate>,
        sensor: Option<&SensorEstimate>,
    ) -> FusionOutput {
        let (w_vision, w_sensor) = self.weights(vision, sensor);
        if w_vision == 0.0 && w_sensor == 0.0 {
            return FusionOutput::empty();
        }

        // Weighted pseudo-measurement and its variance
        let mut z = 0.0;
        let mut r = 0.0;
        if let Some(v) = vision {
            let var = self.vision_variance(v);
            z += w_vision * v.height_m;
            r += w_vision * w_vision * var;
        }
        if let Some(s) = sensor {
            let var = self.sensor_variance(s);
            z += w_sensor * s.height_m;
            r += w_sensor * w_sensor * var;
        }

        let (estimate, variance) = match self.state.estimate_m {
            None => (z, r),
            Some(previous) => {
                let q = self.config.process_sd_m * self.config.process_sd_m;
                let p_prior = self.state.variance_m2 + q;
                let gain = p_prior / (p_prior + r);
                let estimate = previous + gain * (z - previous);
                (estimate, (1.0 - gain) * p_prior)
            }
        };

        self.state.estimate_m = Some(estimate);
        self.state.variance_m2 = variance;

        let fused_sd = libm::sqrtf(variance.max(0.0));
        let vision_confidence = vision.map(|v| v.confidence.as_float()).unwrap_or(0.5);
        let confidence = 0.5 * vision_confidence + 0.5 * (1.0 / (1.0 + fused_sd));

        FusionOutput {
            height_m: estimate,
            std_dev_m: fused_sd,
            confidence: ConfidenceScore::from_float(confidence),
        }
    }

    /// Normalized blend weights for the present inputs
    fn weights(
        &self,
        vision: Option<&VisionEstimate>,
        sensor: Option<&SensorEstimate>,
    ) -> (f32, f32) {
        match (vision, sensor) {
            (None, None) => (0.0, 0.0),
            (Some(_), None) => (1.0, 0.0),
            (None, Some(_)) => (0.0, 1.0),
            (Some(v), Some(_)) => {
                let pct = v.confidence.as_float() * 100.0;
                let w_vision = if pct > self.config.high_confidence_pct {
                    FUSION_WEIGHT_VISION_HIGH
                } else if pct >= self.config.low_confidence_pct {
                    FUSION_WEIGHT_VISION_MID
                } else {
                    FUSION_WEIGHT_VISION_LOW
                };
                (w_vision, 1.0 - w_vision)
            }
        }
    }

    fn vision_variance(&self, v: &VisionEstimate) -> f32 {
        let sd = match v.std_dev_m {
            Some(sd) if sd > 0.0 => sd,
            _ => sd_from_confidence(self.config.baseline_sd_m, v.confidence.as_float()),
        };
        sd * sd
    }

    fn sensor_variance(&self, s: &SensorEstimate) -> f32 {
        let sd = match s.std_dev_m {
            Some(sd) if sd > 0.0 => sd,
            _ => self.config.baseline_sd_m,
        };
        sd * sd
    }
}

/// Infer a measurement SD from a confidence value: full baseline at zero
/// confidence, shrinking to 40% of it at full confidence.
fn sd_from_confidence(baseline_sd_m: f32, confidence01: f32) -> f32 {
    let c = confidence01.clamp(0.0, 1.0);
    baseline_sd_m * (0.4 + (1.0 - c) * 0.6)
}
