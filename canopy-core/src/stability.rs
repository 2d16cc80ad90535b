//! Steadiness Gate for Autonomous Capture
//!
//! ## Overview
//!
//! A handheld reading is only worth trusting when the hand is still. The
//! gate watches the pitch dispersion over the last
//! [`STABILITY_WINDOW_MS`](crate::constants::STABILITY_WINDOW_MS) and
//! classifies the hand as shaky, stabilizing, or ready. While continuously
//! ready it accumulates steady time, and once the required duration has
//! elapsed it signals "capture now" exactly once, then re-arms behind a
//! cooldown.
//!
//! The gate is driven by two independent inputs:
//! - samples, pushed at sensor rate via [`StabilityGate::push_sample`]
//! - evaluation ticks, at a fixed ~100 ms interval via
//!   [`StabilityGate::tick`]
//!
//! Decoupling the two keeps the steadiness decision independent of the
//! sensor's delivery cadence.
//!
//! ## Classification
//!
//! Sample standard deviation of pitch, in degrees, over the active window:
//!
//! | sd (deg)        | class       |
//! |-----------------|-------------|
//! | >= 0.2          | Shaky       |
//! | [0.1, 0.2)      | Stabilizing |
//! | < 0.1           | Ready       |
//!
//! Fewer than 30 samples in the window reports Shaky with zero progress -
//! a standard deviation over a handful of frames says nothing.
//!
//! ## Manual capture
//!
//! Manual capture bypasses the countdown entirely but is still advisory-
//! gated: fewer than 10 buffered samples or (for a base-angle capture)
//! more than 5 degrees of roll gets a typed error the UI shows as a
//! "too shaky" warning.

use crate::{
    constants::{
        CAPTURE_COOLDOWN_MS, DEG_PER_RAD, MAX_BASE_CAPTURE_ROLL_DEG, MIN_CAPTURE_SAMPLES,
        MIN_CLASSIFY_SAMPLES, READY_SD_DEG, SHAKY_SD_DEG, STABILITY_WINDOW_MS, STEADY_REQUIRED_MS,
    },
    errors::{MeasureError, MeasureResult},
    sampler::OrientationSample,
    time::Timestamp,
    window::{CapturedAngle, PitchSample, SampleWindow},
};

/// Steadiness classification of the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Steadiness {
    /// Too much jitter to trust anything
    Shaky,
    /// Settling; not yet capture-grade
    Stabilizing,
    /// Steady enough to count toward auto-capture
    Ready,
}

/// Gate policy knobs, defaulting to the tuned constants
#[derive(Debug, Clone)]
pub struct StabilityConfig {
    /// Evaluation window span in milliseconds
    pub window_ms: u64,
    /// Standard deviation at or above which the hand is shaky (degrees)
    pub shaky_sd_deg: f32,
    /// Standard deviation below which the hand is ready (degrees)
    pub ready_sd_deg: f32,
    /// Samples required before classification is attempted
    pub min_classify_samples: usize,
    /// Continuous ready-time required before auto-capture (milliseconds)
    pub required_steady_ms: u64,
    /// Re-arm delay after a capture (milliseconds)
    pub cooldown_ms: u64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            window_ms: STABILITY_WINDOW_MS,
            shaky_sd_deg: SHAKY_SD_DEG,
            ready_sd_deg: READY_SD_DEG,
            min_classify_samples: MIN_CLASSIFY_SAMPLES,
            required_steady_ms: STEADY_REQUIRED_MS,
            cooldown_ms: CAPTURE_COOLDOWN_MS,
        }
    }
}

impl StabilityConfig {
    /// Set the required continuous steady time
    pub fn with_required_steady_ms(mut self, ms: u64) -> Self {
        self.required_steady_ms = ms;
        self
    }

    /// Set the post-capture cooldown
    pub fn with_cooldown_ms(mut self, ms: u64) -> Self {
        self.cooldown_ms = ms;
        self
    }
}

/// Result of one gate evaluation tick
#[derive(Debug, Clone, Copy)]
pub struct GateStatus {
    /// Current classification
    pub steadiness: Steadiness,
    /// Pitch standard deviation in degrees, when classifiable
    pub sd_deg: Option<f32>,
    /// Steady-time progress toward auto-capture, in [0, 1]
    pub progress: f32,
    /// Seconds of continuous steadiness still required
    pub seconds_remaining: f32,
    /// True on the single tick where auto-capture fires
    pub capture_now: bool,
}

/// Steadiness gate and auto-capture state machine
pub struct StabilityGate {
    config: StabilityConfig,
    window: SampleWindow,
    steady_since: Option<Timestamp>,
    last_capture_at: Option<Timestamp>,
    auto_capture: bool,
    paused: bool,
    last_roll_rad: f32,
}

impl StabilityGate {
    /// Create a gate with the given policy
    pub fn new(config: StabilityConfig) -> Self {
        let window = SampleWindow::new(config.window_ms);
        Self {
            config,
            window,
            steady_since: None,
            last_capture_at: None,
            auto_capture: true,
            paused: false,
            last_roll_rad: 0.0,
        }
    }

    /// Gate with default policy
    pub fn with_defaults() -> Self {
        Self::new(StabilityConfig::default())
    }

    /// Enable or disable the automatic trigger
    pub fn set_auto_capture(&mut self, enabled: bool) {
        self.auto_capture = enabled;
    }

    /// Pause the countdown (e.g. while a modal is up). Steady time
    /// already accumulated is discarded.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        if paused {
            self.steady_since = None;
        }
    }

    /// Feed one sample from the sampler
    pub fn push_sample(&mut self, sample: &OrientationSample) {
        self.last_roll_rad = sample.roll_rad;
        self.window.push(PitchSample {
            timestamp: sample.timestamp,
            pitch_rad: sample.pitch_rad,
        });
    }

    /// Number of samples currently buffered
    pub fn buffered_samples(&self) -> usize {
        self.window.len()
    }

    /// Evaluate steadiness at `now`. Call at a fixed ~100 ms interval.
    pub fn tick(&mut self, now: Timestamp) -> GateStatus {
        self.window.evict_older_than(now);

        let required_s = self.config.required_steady_ms as f32 / 1000.0;

        if self.window.len() < self.config.min_classify_samples {
            self.steady_since = None;
            return GateStatus {
                steadiness: Steadiness::Shaky,
                sd_deg: None,
                progress: 0.0,
                seconds_remaining: required_s,
                capture_now: false,
            };
        }

        // min_classify_samples >= 2 guarantees a defined std_dev here
        let sd_deg = self.window.std_dev().unwrap_or(f32::INFINITY) * DEG_PER_RAD;

        let steadiness = if sd_deg >= self.config.shaky_sd_deg {
            Steadiness::Shaky
        } else if sd_deg >= self.config.ready_sd_deg {
            Steadiness::Stabilizing
        } else {
            Steadiness::Ready
        };

        if steadiness != Steadiness::Ready {
            self.steady_since = None;
            return GateStatus {
                steadiness,
                sd_deg: Some(sd_deg),
                progress: 0.0,
                seconds_remaining: required_s,
                capture_now: false,
            };
        }

        // A paused gate accumulates nothing; the countdown restarts from
        // zero on the first tick after resuming
        if self.paused {
            self.steady_since = None;
            return GateStatus {
                steadiness,
                sd_deg: Some(sd_deg),
                progress: 0.0,
                seconds_remaining: required_s,
                capture_now: false,
            };
        }

        let since = *self.steady_since.get_or_insert(now);
        let elapsed = now.saturating_sub(since);
        let progress =
            (elapsed as f32 / self.config.required_steady_ms as f32).min(1.0);
        let seconds_remaining =
            (self.config.required_steady_ms.saturating_sub(elapsed)) as f32 / 1000.0;

        let in_cooldown = self
            .last_capture_at
            .map(|t| now.saturating_sub(t) < self.config.cooldown_ms)
            .unwrap_or(false);

        let capture_now = progress >= 1.0 && self.auto_capture && !in_cooldown;

        if capture_now {
            // Fire once, then restart the steady timer behind the cooldown
            self.last_capture_at = Some(now);
            self.steady_since = None;
            #[cfg(feature = "log")]
            log::debug!("auto-capture fired at t={} (sd={:.3}°)", now, sd_deg);
        }

        GateStatus {
            steadiness,
            sd_deg: Some(sd_deg),
            progress,
            seconds_remaining,
            capture_now,
        }
    }

    /// Advisory guard for a manual capture.
    ///
    /// `base_angle` captures additionally require the device not be rolled
    /// more than [`MAX_BASE_CAPTURE_ROLL_DEG`] sideways.
    pub fn check_manual_capture(&self, base_angle: bool) -> MeasureResult<()> {
        let available = self.window.len();
        if available < MIN_CAPTURE_SAMPLES {
            return Err(MeasureError::InsufficientSamples {
                required: MIN_CAPTURE_SAMPLES,
                available,
            });
        }

        if base_angle {
            let roll_deg = libm::fabsf(self.last_roll_rad) * DEG_PER_RAD;
            if roll_deg > MAX_BASE_CAPTURE_ROLL_DEG {
                return Err(MeasureError::ExcessiveRoll {
                    roll_deg,
                    max_deg: MAX_BASE_CAPTURE_ROLL_DEG,
                });
            }
        }

        Ok(())
    }

    /// Capture the current window as an angle.
    ///
    /// Applies the manual-capture guard, then snapshots the window median
    /// and standard deviation.
    pub fn capture(&self, base_angle: bool) -> MeasureResult<CapturedAngle> {
        self.check_manual_capture(base_angle)?;
        self.window
            .snapshot(self.last_roll_rad)
            .ok_or(MeasureError::InsufficientSamples {
                required: MIN_CAPTURE_SAMPLES,
                available: 0,
            })
    }

    /// Capture without the advisory guard, for the auto-capture path
    /// where the gate itself has already vouched for the window.
    pub fn capture_unchecked(&self) -> Option<CapturedAngle> {
        self.window.snapshot(self.last_roll_rad)
    }

    /// Discard all state for a fresh target
    pub fn reset(&mut self) {
        self.window.clear();
        self.steady_since = None;
        self.last_capture_at = None;
        self.last_roll_rad = 0.0;
    }
}
