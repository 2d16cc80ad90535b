//! Measurement Session and Collaborator Boundaries
//!
//! `MeasurementSession` is the single owner of all per-measurement state:
//! the stability gate (and its sample window) and the fusion filter.
//! Callers drive it cooperatively - push orientation samples as the
//! sampler produces them, tick the gate from a fixed-interval timer, then
//! capture, solve, and optionally fuse. `reset()` returns everything to
//! the fresh state for the next target; nothing is shared between
//! sessions and nothing needs locking.
//!
//! This module also defines the contact surface with the two external
//! collaborators the engine itself never implements:
//!
//! - the vision side hands over a [`VisionBoundary`] (pixel coordinates
//!   plus a detection confidence), converted to a height estimate with a
//!   caller-supplied meters-per-pixel calibration;
//! - the persistence side receives a [`MeasurementRecord`] through the
//!   [`MeasurementSink`] trait, optionally alongside an opaque
//!   [`PhotoAttachment`] the engine never inspects.

use crate::errors::MeasureResult;
use crate::fusion::{
    ConfidenceScore, FusionConfig, FusionOutput, HeightFusion, SensorEstimate, VisionEstimate,
};
use crate::geometry::{self, GeometryConfig, HeightEstimate, MeasurementMode, Shot};
use crate::sampler::OrientationSample;
use crate::stability::{GateStatus, StabilityConfig, StabilityGate};
use crate::time::{TimeSource, Timestamp};
use crate::uncertainty::{self, GaussianSampler, MonteCarloConfig};
use crate::window::CapturedAngle;

/// Object boundary reported by the vision collaborator, in image space.
///
/// Coordinates are pixel positions `(x, y)`; only the distance between
/// the two points matters to the engine.
#[derive(Debug, Clone, Copy)]
pub struct VisionBoundary {
    /// Detected top of the object (pixels)
    pub top_px: (f32, f32),
    /// Detected base of the object (pixels)
    pub base_px: (f32, f32),
    /// Detection confidence in [0, 1]; clamped on conversion
    pub confidence01: f32,
}

impl VisionBoundary {
    /// Pixel distance between the detected top and base
    pub fn extent_px(&self) -> f32 {
        let dx = self.top_px.0 - self.base_px.0;
        let dy = self.top_px.1 - self.base_px.1;
        libm::sqrtf(dx * dx + dy * dy)
    }
}

impl VisionEstimate {
    /// Build a height estimate from a detected boundary and a pixel
    /// calibration scalar. Confidence outside [0, 1] is clamped rather
    /// than rejected, since it comes from an external detector.
    pub fn from_boundary(boundary: &VisionBoundary, meters_per_pixel: f32) -> Self {
        Self {
            height_m: boundary.extent_px() * meters_per_pixel,
            confidence: ConfidenceScore::from_float(boundary.confidence01),
            std_dev_m: None,
        }
    }
}

/// Opaque token for a photo captured alongside a measurement.
///
/// The engine stores and forwards it, never inspects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PhotoAttachment {
    /// Caller-assigned identifier
    pub id: u32,
    /// Capture time (milliseconds)
    pub timestamp: Timestamp,
}

/// One completed measurement, ready for the persistence collaborator.
///
/// `TwoStop` shots record the step length in `distance_m`, the
/// far-station angle in `base_angle_rad`, and the near-station angle in
/// `top_angle_rad`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeasurementRecord {
    /// Mode the measurement was taken in
    pub mode: MeasurementMode,
    /// Observer eye height used in the solve (meters)
    pub eye_height_m: f32,
    /// Known distance or step length, when the mode has one (meters)
    pub distance_m: Option<f32>,
    /// Base or far-station angle, when the mode has one (radians)
    pub base_angle_rad: Option<f32>,
    /// Top (or near-station) angle (radians)
    pub top_angle_rad: f32,
    /// Resulting height (meters)
    pub result_m: f32,
    /// 10th percentile of the height, when propagated (meters)
    pub p10: Option<f32>,
    /// 90th percentile of the height, when propagated (meters)
    pub p90: Option<f32>,
    /// Completion time (milliseconds)
    pub timestamp: Timestamp,
}

/// Persistence collaborator boundary.
///
/// Implementations decide the storage format; the engine only promises a
/// fully populated record per completed measurement.
pub trait MeasurementSink {
    /// Storage failure type
    type Error;

    /// Persist one record, optionally with its photo token
    fn store(
        &mut self,
        record: &MeasurementRecord,
        photo: Option<&PhotoAttachment>,
    ) -> Result<(), Self::Error>;
}

/// Owner of all per-measurement state.
pub struct MeasurementSession {
    eye_height_m: f32,
    gate: StabilityGate,
    fusion: HeightFusion,
    geometry: GeometryConfig,
    monte_carlo: MonteCarloConfig,
    rng: GaussianSampler,
}

impl MeasurementSession {
    /// Session with the given observer eye height and default policies.
    ///
    /// `seed` drives the uncertainty sampler; a fixed seed makes the
    /// whole session reproducible.
    pub fn new(eye_height_m: f32, seed: u32) -> Self {
        Self {
            eye_height_m,
            gate: StabilityGate::new(StabilityConfig::default()),
            fusion: HeightFusion::new(FusionConfig::default()),
            geometry: GeometryConfig::default(),
            monte_carlo: MonteCarloConfig::default(),
            rng: GaussianSampler::new(seed),
        }
    }

    /// Session seeded from a clock, for callers that want the Monte
    /// Carlo draws to vary between runs. [`SystemTime`](crate::time::SystemTime)
    /// is the usual choice on hosted targets; any [`TimeSource`] works.
    pub fn with_clock_seed(eye_height_m: f32, clock: &impl TimeSource) -> Self {
        Self::new(eye_height_m, clock.now() as u32)
    }

    /// Replace the stability policy (takes effect on the next tick)
    pub fn with_stability_config(mut self, config: StabilityConfig) -> Self {
        self.gate = StabilityGate::new(config);
        self
    }

    /// Replace the geometry validity thresholds
    pub fn with_geometry_config(mut self, config: GeometryConfig) -> Self {
        self.geometry = config;
        self
    }

    /// Replace the uncertainty sampling policy
    pub fn with_monte_carlo_config(mut self, config: MonteCarloConfig) -> Self {
        self.monte_carlo = config;
        self
    }

    /// Observer eye height currently in use (meters)
    pub fn eye_height_m(&self) -> f32 {
        self.eye_height_m
    }

    /// Update the observer eye height between measurements
    pub fn set_eye_height(&mut self, eye_height_m: f32) {
        self.eye_height_m = eye_height_m;
    }

    /// Access the stability gate, e.g. to toggle auto-capture or pause
    pub fn gate_mut(&mut self) -> &mut StabilityGate {
        &mut self.gate
    }

    /// Feed one orientation sample into the gate's window
    pub fn push_sample(&mut self, sample: &OrientationSample) {
        self.gate.push_sample(sample);
    }

    /// Advance the stability gate; call at a fixed interval
    pub fn tick(&mut self, now: Timestamp) -> GateStatus {
        self.gate.tick(now)
    }

    /// Capture the current window as an angle, with readiness checks.
    ///
    /// `base_angle` additionally enforces the roll limit, since roll
    /// correction degrades for downward base shots.
    pub fn capture(&self, base_angle: bool) -> MeasureResult<CapturedAngle> {
        self.gate.capture(base_angle)
    }

    /// Solve a complete shot into a height estimate.
    ///
    /// Base+top shots go through the Monte Carlo path and carry a
    /// percentile range; the other modes return a point estimate.
    pub fn measure(&mut self, shot: &Shot) -> MeasureResult<HeightEstimate> {
        let estimate = match shot {
            Shot::BaseTop { base, top } => uncertainty::base_top_estimate(
                self.eye_height_m,
                base,
                top,
                &self.geometry,
                &self.monte_carlo,
                &mut self.rng,
            )?,
            _ => geometry::solve(shot, self.eye_height_m, &self.geometry)
                .map(HeightEstimate::point)?,
        };
        #[cfg(feature = "log")]
        log::info!(
            "measured {:?}: {:.2} m",
            shot.mode(),
            estimate.height_m
        );
        Ok(estimate)
    }

    /// Fuse a vision estimate with the sensor-derived one.
    ///
    /// Either side may be absent; with neither the sentinel output is
    /// returned (see [`FusionOutput::is_empty`]).
    pub fn fuse(
        &mut self,
        vision: Option<&VisionEstimate>,
        sensor: Option<&SensorEstimate>,
    ) -> FusionOutput {
        self.fusion.fuse(vision, sensor)
    }

    /// Build the persistence record for a solved shot.
    pub fn finalize_record(
        &self,
        shot: &Shot,
        estimate: &HeightEstimate,
        timestamp: Timestamp,
    ) -> MeasurementRecord {
        let (distance_m, base_angle_rad, top_angle_rad) = match shot {
            Shot::Paced { distance_m, top } => (Some(*distance_m), None, top.median_rad),
            Shot::BaseTop { base, top } => (None, Some(base.median_rad), top.median_rad),
            Shot::TwoStop { step_m, far, near } => {
                (Some(*step_m), Some(far.median_rad), near.median_rad)
            }
        };
        MeasurementRecord {
            mode: shot.mode(),
            eye_height_m: self.eye_height_m,
            distance_m,
            base_angle_rad,
            top_angle_rad,
            result_m: estimate.height_m,
            p10: estimate.percentile_range.map(|r| r.p10),
            p90: estimate.percentile_range.map(|r| r.p90),
            timestamp,
        }
    }

    /// Clear gate and fusion state for the next target
    pub fn reset(&mut self) {
        self.gate.reset();
        self.fusion.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::RAD_PER_DEG;
    use crate::sampler::OrientationSample;
    use crate::stability::Steadiness;

    fn steady_sample(timestamp: Timestamp, pitch_deg: f32) -> OrientationSample {
        OrientationSample {
            timestamp,
            pitch_rad: pitch_deg * RAD_PER_DEG,
            roll_rad: 0.0,
            yaw_rad: None,
        }
    }

    #[test]
    fn boundary_extent_is_euclidean() {
        let boundary = VisionBoundary {
            top_px: (100.0, 40.0),
            base_px: (100.0, 640.0),
            confidence01: 0.8,
        };
        assert_eq!(boundary.extent_px(), 600.0);

        let diagonal = VisionBoundary {
            top_px: (3.0, 0.0),
            base_px: (0.0, 4.0),
            confidence01: 0.8,
        };
        assert!((diagonal.extent_px() - 5.0).abs() < 1e-5);
    }

    #[test]
    fn vision_estimate_from_boundary_scales_and_clamps() {
        let boundary = VisionBoundary {
            top_px: (0.0, 0.0),
            base_px: (0.0, 500.0),
            confidence01: 1.4,
        };
        let estimate = VisionEstimate::from_boundary(&boundary, 0.02);

        assert!((estimate.height_m - 10.0).abs() < 1e-4);
        assert_eq!(estimate.confidence, ConfidenceScore::MAX);
        assert!(estimate.std_dev_m.is_none());
    }

    #[test]
    fn session_steady_flow_captures_and_measures() {
        let mut session = MeasurementSession::new(1.65, 42);

        // Perfectly still base capture at -10 degrees
        for i in 0..40u64 {
            session.push_sample(&steady_sample(i * 100, -10.0));
        }
        let status = session.tick(4000);
        assert_eq!(status.steadiness, Steadiness::Ready);

        let base = session.capture(true).unwrap();
        assert!((base.median_rad - (-10.0 * RAD_PER_DEG)).abs() < 1e-5);

        // Re-aim and hold on the top at 35 degrees
        session.gate_mut().reset();
        for i in 0..40u64 {
            session.push_sample(&steady_sample(5000 + i * 100, 35.0));
        }
        session.tick(9000);
        let top = session.capture(false).unwrap();

        let shot = Shot::BaseTop { base, top };
        let estimate = session.measure(&shot).unwrap();

        // d = eye/tan(10°) ≈ 9.357 m, h = eye + d·tan(35°) ≈ 8.20 m
        assert!((estimate.height_m - 8.20).abs() < 0.05);
        // Zero-variance captures fall back to the default angle SD,
        // so a percentile range is still produced
        assert!(estimate.percentile_range.is_some());
    }

    #[test]
    fn clock_seeded_session_matches_explicit_seed() {
        use crate::time::FixedTime;

        let base = CapturedAngle {
            median_rad: -9.0 * RAD_PER_DEG,
            std_dev_rad: 0.002,
            roll_at_capture_rad: 0.0,
        };
        let top = CapturedAngle {
            median_rad: 28.0 * RAD_PER_DEG,
            std_dev_rad: 0.002,
            roll_at_capture_rad: 0.0,
        };
        let shot = Shot::BaseTop { base, top };

        let mut clocked = MeasurementSession::with_clock_seed(1.65, &FixedTime::new(777));
        let mut explicit = MeasurementSession::new(1.65, 777);

        // Same seed, same Monte Carlo draws, same percentile range
        let a = clocked.measure(&shot).unwrap();
        let b = explicit.measure(&shot).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn record_carries_mode_fields_and_percentiles() {
        let session = MeasurementSession::new(1.6, 7);
        let base = CapturedAngle {
            median_rad: -8.0 * RAD_PER_DEG,
            std_dev_rad: 0.001,
            roll_at_capture_rad: 0.0,
        };
        let top = CapturedAngle {
            median_rad: 30.0 * RAD_PER_DEG,
            std_dev_rad: 0.001,
            roll_at_capture_rad: 0.0,
        };
        let shot = Shot::BaseTop { base, top };
        let estimate = HeightEstimate {
            height_m: 8.1,
            uncertainty_m: Some(0.4),
            percentile_range: Some(crate::geometry::PercentileRange { p10: 7.7, p90: 8.5 }),
        };

        let record = session.finalize_record(&shot, &estimate, 12345);

        assert_eq!(record.mode, MeasurementMode::BaseTop);
        assert_eq!(record.eye_height_m, 1.6);
        assert!(record.distance_m.is_none());
        assert_eq!(record.base_angle_rad, Some(base.median_rad));
        assert_eq!(record.top_angle_rad, top.median_rad);
        assert_eq!(record.result_m, 8.1);
        assert_eq!(record.p10, Some(7.7));
        assert_eq!(record.p90, Some(8.5));
        assert_eq!(record.timestamp, 12345);
    }

    #[test]
    fn sink_receives_record_and_photo() {
        struct VecSink {
            stored: Vec<(MeasurementRecord, Option<PhotoAttachment>)>,
        }
        impl MeasurementSink for VecSink {
            type Error = ();
            fn store(
                &mut self,
                record: &MeasurementRecord,
                photo: Option<&PhotoAttachment>,
            ) -> Result<(), ()> {
                self.stored.push((*record, photo.copied()));
                Ok(())
            }
        }

        let session = MeasurementSession::new(1.7, 1);
        let top = CapturedAngle {
            median_rad: 20.0 * RAD_PER_DEG,
            std_dev_rad: 0.0,
            roll_at_capture_rad: 0.0,
        };
        let shot = Shot::Paced {
            distance_m: 12.0,
            top,
        };
        let estimate = HeightEstimate::point(6.07);
        let record = session.finalize_record(&shot, &estimate, 99);
        let photo = PhotoAttachment {
            id: 3,
            timestamp: 99,
        };

        let mut sink = VecSink { stored: Vec::new() };
        sink.store(&record, Some(&photo)).unwrap();

        assert_eq!(sink.stored.len(), 1);
        assert_eq!(sink.stored[0].0.distance_m, Some(12.0));
        assert_eq!(sink.stored[0].1, Some(photo));
    }

    #[test]
    fn reset_clears_gate_and_fusion() {
        let mut session = MeasurementSession::new(1.65, 42);
        for i in 0..40u64 {
            session.push_sample(&steady_sample(i * 100, 12.0));
        }
        session.tick(4000);
        session.fuse(
            Some(&VisionEstimate {
                height_m: 9.0,
                confidence: ConfidenceScore::from_float(0.9),
                std_dev_m: None,
            }),
            None,
        );

        session.reset();

        // Gate window is empty again and fusion restarts from scratch
        assert!(session.capture(false).is_err());
        let out = session.fuse(
            Some(&VisionEstimate {
                height_m: 4.0,
                confidence: ConfidenceScore::from_float(0.9),
                std_dev_m: None,
            }),
            None,
        );
        assert_eq!(out.height_m, 4.0);
    }
}
