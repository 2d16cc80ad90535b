//! Core measurement engine for Canopy
//!
//! Turns a stream of device tilt readings into validated object heights.
//! Designed for handheld field use, where the operator's grip is the
//! dominant noise source.
//!
//! Key constraints:
//! - No heap allocation in the sampling path
//! - All transcendental math through `libm`, portable to `no_std` targets
//! - Deterministic given a timestamp source and an RNG seed
//!
//! ```no_run
//! use canopy_core::{MeasurementSession, Shot};
//!
//! let mut session = MeasurementSession::new(1.65, 42);
//!
//! // ... push orientation samples and tick until the gate reads Ready ...
//! let base = session.capture(true)?;
//! let top = session.capture(false)?;
//!
//! let estimate = session.measure(&Shot::BaseTop { base, top })?;
//! println!("height: {:.2} m", estimate.height_m);
//! # Ok::<(), canopy_core::MeasureError>(())
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod constants;
pub mod errors;
pub mod fusion;
pub mod geometry;
pub mod sampler;
pub mod session;
pub mod stability;
pub mod time;
pub mod uncertainty;
pub mod window;

// Public API
pub use errors::{GeometryReason, MeasureError, MeasureResult};
pub use fusion::{
    ConfidenceScore, FusionConfig, FusionOutput, HeightFusion, SensorEstimate, VisionEstimate,
};
pub use geometry::{
    GeometryConfig, HeightEstimate, MeasurementMode, PercentileRange, Shot,
};
pub use sampler::{
    OrientationSample, OrientationSampler, PermissionState, RawTilt, SensorFault, TiltSensor,
};
pub use session::{
    MeasurementRecord, MeasurementSession, MeasurementSink, PhotoAttachment, VisionBoundary,
};
pub use stability::{GateStatus, StabilityConfig, StabilityGate, Steadiness};
pub use time::{TimeSource, Timestamp};
pub use uncertainty::{GaussianSampler, MonteCarloConfig};
pub use window::{CapturedAngle, SampleWindow};

/// Crate version, from Cargo
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
