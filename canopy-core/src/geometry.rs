//! Trigonometric Height Solvers
//!
//! ## Overview
//!
//! Three pure, stateless computations turn captured elevation angles and
//! known baseline lengths into a height in meters. The active
//! [`Shot`] variant carries exactly the captures its mode needs - there
//! are no optional fields to null-check at runtime.
//!
//! ```text
//! Paced:    h = camera + d·tan(θ)          (known distance d)
//! BaseTop:  d' = eye/tan(|θ1|)             (distance implied by base angle)
//!           h  = eye + d'·tan(θ2)
//! TwoStop:  d_far = L·tan(A2)/(tan(A2) - tan(A1))
//!           h     = eye + d_far·tan(A1)    (two stations, step L apart)
//! ```
//!
//! ## Validity
//!
//! Each mode has its own rejection conditions (angle ranges, minimum
//! separations, distance bounds). Invalid input is a reportable
//! [`MeasureError`], never a silent default - the caller re-prompts the
//! user to recapture. The thresholds are tuned policy, adjustable through
//! [`GeometryConfig`].

use crate::{
    constants::{
        BASE_ANGLE_MAX_DEG, BASE_ANGLE_MIN_DEG, BASE_TOP_MIN_SEPARATION_DEG, DEG_PER_RAD,
        PACED_MAX_DISTANCE_M, PACED_MIN_ANGLE_DEG, PACED_MIN_DISTANCE_M,
        TWO_STOP_MIN_SEPARATION_DEG,
    },
    errors::{GeometryReason, MeasureError, MeasureResult},
    window::CapturedAngle,
};

/// Which formula a measurement uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MeasurementMode {
    /// Known distance plus one top angle
    Paced,
    /// Base angle plus top angle from one stance
    BaseTop,
    /// Two top angles separated by a known forward step
    TwoStop,
}

/// A complete set of captures for one measurement.
///
/// The variant determines the formula; each carries only the fields valid
/// for its mode.
#[derive(Debug, Clone, Copy)]
pub enum Shot {
    /// Known-distance mode: the user paced or entered `distance_m`
    Paced {
        /// Horizontal distance from observer to object (meters)
        distance_m: f32,
        /// Captured top elevation angle
        top: CapturedAngle,
    },
    /// Base-plus-top mode from a single stance
    BaseTop {
        /// Captured base angle (depression toward the object's base)
        base: CapturedAngle,
        /// Captured top elevation angle
        top: CapturedAngle,
    },
    /// Baseless two-station mode
    TwoStop {
        /// Forward step length walked between the captures (meters)
        step_m: f32,
        /// Top angle from the far station
        far: CapturedAngle,
        /// Top angle from the near station
        near: CapturedAngle,
    },
}

impl Shot {
    /// The mode this shot resolves under
    pub fn mode(&self) -> MeasurementMode {
        match self {
            Shot::Paced { .. } => MeasurementMode::Paced,
            Shot::BaseTop { .. } => MeasurementMode::BaseTop,
            Shot::TwoStop { .. } => MeasurementMode::TwoStop,
        }
    }
}

/// Validity thresholds for the solvers.
///
/// Tuned policy constants, not derived invariants; override per field when
/// a deployment needs a different envelope.
#[derive(Debug, Clone)]
pub struct GeometryConfig {
    /// Minimum |top angle| for paced mode (degrees)
    pub paced_min_angle_deg: f32,
    /// Valid paced distance range (meters)
    pub paced_distance_range_m: (f32, f32),
    /// Valid |base angle| range for base+top mode (degrees)
    pub base_angle_range_deg: (f32, f32),
    /// Minimum top-base separation for base+top mode (degrees)
    pub base_top_min_separation_deg: f32,
    /// Minimum separation between the two stop angles (degrees)
    pub two_stop_min_separation_deg: f32,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            paced_min_angle_deg: PACED_MIN_ANGLE_DEG,
            paced_distance_range_m: (PACED_MIN_DISTANCE_M, PACED_MAX_DISTANCE_M),
            base_angle_range_deg: (BASE_ANGLE_MIN_DEG, BASE_ANGLE_MAX_DEG),
            base_top_min_separation_deg: BASE_TOP_MIN_SEPARATION_DEG,
            two_stop_min_separation_deg: TWO_STOP_MIN_SEPARATION_DEG,
        }
    }
}

/// Height estimate with optional uncertainty bounds
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeightEstimate {
    /// Point estimate in meters
    pub height_m: f32,
    /// Standard-deviation-like spread, when known (meters)
    pub uncertainty_m: Option<f32>,
    /// Empirical percentile range, when propagated (meters)
    pub percentile_range: Option<PercentileRange>,
}

/// Empirical low/high percentile bounds of a height estimate
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PercentileRange {
    /// 10th percentile (meters)
    pub p10: f32,
    /// 90th percentile (meters)
    pub p90: f32,
}

impl HeightEstimate {
    /// Point estimate with no uncertainty information
    pub fn point(height_m: f32) -> Self {
        Self {
            height_m,
            uncertainty_m: None,
            percentile_range: None,
        }
    }
}

/// Solve a shot under the given config and observer eye height.
pub fn solve(shot: &Shot, eye_height_m: f32, config: &GeometryConfig) -> MeasureResult<f32> {
    match shot {
        Shot::Paced { distance_m, top } => {
            paced_height(eye_height_m, *distance_m, top.median_rad, config)
        }
        Shot::BaseTop { base, top } => {
            base_top_height(eye_height_m, base.median_rad, top.median_rad, config)
        }
        Shot::TwoStop { step_m, far, near } => {
            two_stop_height(eye_height_m, *step_m, far.median_rad, near.median_rad, config)
                .map(|(_, height)| height)
        }
    }
}

/// Known-distance mode: `h = camera + d·tan(θ)`.
///
/// Rejects a top angle flatter than the configured minimum - near the
/// horizon the tangent carries almost no height information - and a
/// distance outside the supported pacing range.
pub fn paced_height(
    camera_height_m: f32,
    distance_m: f32,
    top_rad: f32,
    config: &GeometryConfig,
) -> MeasureResult<f32> {
    let (min_d, max_d) = config.paced_distance_range_m;
    if !distance_m.is_finite() || distance_m < min_d || distance_m > max_d {
        return Err(MeasureError::GeometryInvalid {
            reason: GeometryReason::DistanceOutOfRange,
        });
    }

    let top_deg = libm::fabsf(top_rad) * DEG_PER_RAD;
    if top_deg < config.paced_min_angle_deg {
        return Err(MeasureError::GeometryInvalid {
            reason: GeometryReason::TooSmallAngle,
        });
    }

    let height = camera_height_m + distance_m * libm::tanf(top_rad);
    if !height.is_finite() || height <= 0.0 {
        return Err(MeasureError::NonFiniteResult);
    }
    Ok(height)
}

/// Base-plus-top mode.
///
/// The base angle (a depression toward the object's foot) implies the
/// horizontal distance `d' = eye/tan(|θ1|)`; the top angle then gives
/// `h = eye + d'·tan(θ2)`.
pub fn base_top_height(
    eye_height_m: f32,
    base_rad: f32,
    top_rad: f32,
    config: &GeometryConfig,
) -> MeasureResult<f32> {
    let base_deg = libm::fabsf(base_rad) * DEG_PER_RAD;
    let (min_deg, max_deg) = config.base_angle_range_deg;

    if base_deg < min_deg {
        return Err(MeasureError::GeometryInvalid {
            reason: GeometryReason::TooShallow,
        });
    }
    if base_deg > max_deg {
        return Err(MeasureError::GeometryInvalid {
            reason: GeometryReason::TooSteep,
        });
    }

    // Separation between the top elevation and the (signed) base angle
    let separation_deg = (top_rad - base_rad) * DEG_PER_RAD;
    if separation_deg < config.base_top_min_separation_deg {
        return Err(MeasureError::GeometryInvalid {
            reason: GeometryReason::SeparationTooSmall,
        });
    }

    let height = base_top_height_unchecked(eye_height_m, base_rad, top_rad);
    if !height.is_finite() || height <= 0.0 {
        return Err(MeasureError::NonFiniteResult);
    }
    Ok(height)
}

/// The raw base+top formula with no validity checks.
///
/// The Monte Carlo estimator runs perturbed angles through this and
/// discards non-finite outcomes itself; everyone else wants
/// [`base_top_height`].
pub fn base_top_height_unchecked(eye_height_m: f32, base_rad: f32, top_rad: f32) -> f32 {
    let implied_distance = eye_height_m / libm::tanf(libm::fabsf(base_rad));
    eye_height_m + implied_distance * libm::tanf(top_rad)
}

/// Baseless two-station mode.
///
/// The observer captures the top from a far station, walks `step_m`
/// directly toward the object, and captures again. Solving
/// `h - eye = d·tan(A1) = (d - L)·tan(A2)` for the far distance:
///
/// ```text
/// d_far = L·tan(A2) / (tan(A2) - tan(A1))
/// ```
///
/// Returns `(distance_far_m, height_m)`. Rejects angle pairs with less
/// than the configured parallax, and any non-finite or non-positive
/// derived distance or height (including a near distance that would put
/// the second station past the object).
pub fn two_stop_height(
    eye_height_m: f32,
    step_m: f32,
    far_rad: f32,
    near_rad: f32,
    config: &GeometryConfig,
) -> MeasureResult<(f32, f32)> {
    let separation_deg = libm::fabsf(near_rad - far_rad) * DEG_PER_RAD;
    if separation_deg < config.two_stop_min_separation_deg {
        return Err(MeasureError::GeometryInvalid {
            reason: GeometryReason::TooSimilar,
        });
    }

    let tan_far = libm::tanf(far_rad);
    let tan_near = libm::tanf(near_rad);
    let denom = tan_near - tan_far;

    let distance_far = step_m * tan_near / denom;
    let distance_near = distance_far - step_m;
    let height = eye_height_m + distance_far * tan_far;

    let valid = distance_far.is_finite()
        && height.is_finite()
        && distance_far > 0.0
        && distance_near > 0.0
        && height > 0.0;
    if !valid {
        return Err(MeasureError::NonFiniteResult);
    }

    Ok((distance_far, height))
}
