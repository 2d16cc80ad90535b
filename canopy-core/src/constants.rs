//! Policy constants for the measurement engine
//!
//! Every empirically chosen threshold lives here with units in the name.
//! The steadiness classification bounds, the separation minimums, and the
//! noise defaults are tuned values, not derived invariants - treat them as
//! configuration policy. Config structs take their defaults from these.
//!
//! Two thresholds look similar but serve different purposes and are kept
//! deliberately distinct:
//! - [`MIN_CLASSIFY_SAMPLES`] (30): how much history the stability gate
//!   needs before its standard deviation means anything.
//! - [`MIN_CAPTURE_SAMPLES`] (10): the bare minimum buffered readings for
//!   a *manual* capture to be worth taking at all.

// ---------------------------------------------------------------------------
// Stability gate
// ---------------------------------------------------------------------------

/// Width of the steadiness evaluation window in milliseconds
pub const STABILITY_WINDOW_MS: u64 = 3000;

/// Interval between steadiness evaluations in milliseconds
pub const STABILITY_TICK_MS: u64 = 100;

/// Pitch standard deviation at or above which the hand counts as shaky (degrees)
pub const SHAKY_SD_DEG: f32 = 0.2;

/// Pitch standard deviation below which the hand counts as ready (degrees)
pub const READY_SD_DEG: f32 = 0.1;

/// Samples required in the window before steadiness is classified at all
pub const MIN_CLASSIFY_SAMPLES: usize = 30;

/// Buffered samples required before a manual capture is allowed
pub const MIN_CAPTURE_SAMPLES: usize = 10;

/// Continuous ready-time required before auto-capture fires (milliseconds)
pub const STEADY_REQUIRED_MS: u64 = 2500;

/// Post-capture window during which auto-capture may not re-fire (milliseconds)
pub const CAPTURE_COOLDOWN_MS: u64 = 1000;

/// Maximum device roll magnitude for a manual base-angle capture (degrees)
pub const MAX_BASE_CAPTURE_ROLL_DEG: f32 = 5.0;

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Minimum top-angle magnitude for paced mode (degrees)
pub const PACED_MIN_ANGLE_DEG: f32 = 5.0;

/// Minimum user-supplied distance for paced mode (meters)
pub const PACED_MIN_DISTANCE_M: f32 = 3.0;

/// Maximum user-supplied distance for paced mode (meters)
pub const PACED_MAX_DISTANCE_M: f32 = 25.0;

/// Minimum base-angle magnitude for base+top mode (degrees)
pub const BASE_ANGLE_MIN_DEG: f32 = 2.0;

/// Maximum base-angle magnitude for base+top mode (degrees)
pub const BASE_ANGLE_MAX_DEG: f32 = 35.0;

/// Minimum base/top angular separation for base+top mode (degrees)
pub const BASE_TOP_MIN_SEPARATION_DEG: f32 = 5.0;

/// Minimum angular separation between the two stops (degrees)
pub const TWO_STOP_MIN_SEPARATION_DEG: f32 = 3.0;

// ---------------------------------------------------------------------------
// Uncertainty propagation
// ---------------------------------------------------------------------------

/// Default Monte Carlo trial count
pub const MC_DEFAULT_TRIALS: usize = 400;

/// Hard capacity of the trial result buffer
pub const MC_MAX_TRIALS: usize = 512;

/// Angle standard deviation assumed when a capture reports none (radians).
/// Roughly 0.5 degrees, typical hand jitter after the gate says ready.
pub const DEFAULT_ANGLE_SD_RAD: f32 = 0.0087;

/// Lower percentile reported by the uncertainty estimator
pub const PERCENTILE_LOW: f32 = 0.10;

/// Upper percentile reported by the uncertainty estimator
pub const PERCENTILE_HIGH: f32 = 0.90;

// ---------------------------------------------------------------------------
// Fusion
// ---------------------------------------------------------------------------

/// Baseline measurement standard deviation when an estimate carries none (meters)
pub const FUSION_BASELINE_SD_M: f32 = 0.75;

/// Process noise standard deviation between fusion updates (meters).
/// The true height is constant; this allows slow re-estimation drift.
pub const FUSION_PROCESS_SD_M: f32 = 0.25;

/// Vision confidence (percent) above which vision dominates the blend
pub const FUSION_HIGH_CONFIDENCE_PCT: f32 = 85.0;

/// Vision confidence (percent) below which the sensor estimate dominates
pub const FUSION_LOW_CONFIDENCE_PCT: f32 = 70.0;

/// Vision weight when vision confidence is high (sensor gets the rest)
pub const FUSION_WEIGHT_VISION_HIGH: f32 = 0.7;

/// Vision weight in the balanced confidence band
pub const FUSION_WEIGHT_VISION_MID: f32 = 0.5;

/// Vision weight when vision confidence is low
pub const FUSION_WEIGHT_VISION_LOW: f32 = 0.3;

// ---------------------------------------------------------------------------
// Angle helpers
// ---------------------------------------------------------------------------

/// Degrees per radian
pub const DEG_PER_RAD: f32 = 57.295_78;

/// Radians per degree
pub const RAD_PER_DEG: f32 = 0.017_453_292;
