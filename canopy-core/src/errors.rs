//! Error Types for Field Measurement Failures
//!
//! ## Design Philosophy
//!
//! Canopy's error system is designed for a handheld device that keeps
//! sampling while the user waves it around:
//!
//! 1. **Small Size**: Each variant carries only inline data, so errors can be
//!    returned from the sampling hot path and stored without allocation.
//!
//! 2. **Copy Semantics**: Errors implement Copy for cheap return from
//!    functions that run on every tick.
//!
//! 3. **Recoverable by Default**: Geometry and uncertainty failures are
//!    ordinary values handed back to the caller, who re-prompts the user to
//!    recapture. They are never panics and never silently defaulted.
//!
//! ## Error Categories
//!
//! ### Sensing failures ("can't sense")
//! - `UnsupportedDevice`: no usable tilt sensor on this hardware
//! - `PermissionDenied`: the user or OS refused sensor access
//!
//! These surface from [`OrientationSampler::start`](crate::sampler::OrientationSampler::start)
//! so the calling UI can distinguish a broken device from a bad reading.
//!
//! ### Capture failures ("sensed badly")
//! - `InsufficientSamples`: capture attempted before the window warmed up
//! - `ExcessiveRoll`: device tilted too far sideways for a base-angle capture
//! - `GeometryInvalid`: angle or distance out of range for the active mode,
//!   with a sub-reason telling the user how to fix their stance
//! - `NonFiniteResult`: degenerate geometry produced a non-finite or
//!   negative height/distance
//!
//! ### Fusion
//! - `FusionNoInput`: both vision and sensor estimates absent. The filter
//!   itself returns a sentinel output instead of this error, since fusion is
//!   legitimately invoked speculatively; the variant exists for callers that
//!   want to propagate the condition.

use thiserror_no_std::Error;

/// Result type for measurement operations
pub type MeasureResult<T> = Result<T, MeasureError>;

/// Why a geometry solver rejected its inputs.
///
/// Each reason maps to a concrete instruction for the user, so the calling
/// UI never has to reverse-engineer the math to build a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GeometryReason {
    /// Base angle below the minimum. The implied distance
    /// `eye_height / tan(base)` blows up as the angle approaches zero, so
    /// the reading is untrustworthy. Prompt: move farther and recapture
    /// from a stance where the base sits clearly below the horizon.
    TooShallow,
    /// Base angle above the maximum - looking down too steeply at the
    /// object's base. Prompt: recapture at closer range.
    TooSteep,
    /// Top elevation angle too close to the horizon for a trustworthy
    /// tangent (paced mode). Fix: move closer or aim higher.
    TooSmallAngle,
    /// Two-stop angles differ by too little - insufficient parallax
    /// between the two observation points.
    TooSimilar,
    /// Base/top angular separation below the minimum.
    /// Fix: move closer or aim higher.
    SeparationTooSmall,
    /// User-supplied distance outside the supported pacing range.
    DistanceOutOfRange,
}

/// Measurement errors - kept small and allocation-free
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum MeasureError {
    /// No usable tilt sensor on this device
    #[error("Device has no supported orientation sensor")]
    UnsupportedDevice,

    /// Sensor permission refused by the user or platform
    #[error("Orientation sensor permission denied")]
    PermissionDenied,

    /// Capture attempted before the sample window warmed up
    #[error("Insufficient samples: need {required}, have {available}")]
    InsufficientSamples {
        /// Minimum number of buffered samples for this operation
        required: usize,
        /// Samples actually available
        available: usize,
    },

    /// Device rolled too far sideways for a base-angle capture
    #[error("Roll {roll_deg}° exceeds limit {max_deg}°")]
    ExcessiveRoll {
        /// Measured roll magnitude in degrees
        roll_deg: f32,
        /// Maximum roll allowed for this capture
        max_deg: f32,
    },

    /// Inputs outside the valid range for the active measurement mode
    #[error("Geometry invalid: {reason:?}")]
    GeometryInvalid {
        /// Specific validity violation, for user-facing guidance
        reason: GeometryReason,
    },

    /// Derived height or distance was non-finite or negative
    #[error("Computed result is not a finite positive value")]
    NonFiniteResult,

    /// Fusion invoked with neither a vision nor a sensor estimate
    #[error("Fusion called with no inputs")]
    FusionNoInput,
}

impl MeasureError {
    /// True for failures of the sensing layer itself, as opposed to a
    /// capture that went through but produced unusable numbers.
    ///
    /// Calling UI uses this split to show "can't sense" versus
    /// "recapture, please".
    pub fn is_sensor_failure(&self) -> bool {
        matches!(
            self,
            MeasureError::UnsupportedDevice | MeasureError::PermissionDenied
        )
    }

    /// True when the right response is to ask the user to capture again.
    pub fn is_recoverable_capture(&self) -> bool {
        matches!(
            self,
            MeasureError::InsufficientSamples { .. }
                | MeasureError::ExcessiveRoll { .. }
                | MeasureError::GeometryInvalid { .. }
                | MeasureError::NonFiniteResult
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for MeasureError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::UnsupportedDevice => defmt::write!(fmt, "No supported sensor"),
            Self::PermissionDenied => defmt::write!(fmt, "Permission denied"),
            Self::InsufficientSamples { required, available } =>
                defmt::write!(fmt, "Need {} samples, have {}", required, available),
            Self::ExcessiveRoll { roll_deg, max_deg } =>
                defmt::write!(fmt, "Roll {}° exceeds {}°", roll_deg, max_deg),
            Self::GeometryInvalid { .. } =>
                defmt::write!(fmt, "Geometry invalid"),
            Self::NonFiniteResult =>
                defmt::write!(fmt, "Non-finite result"),
            Self::FusionNoInput =>
                defmt::write!(fmt, "Fusion has no inputs"),
        }
    }
}
