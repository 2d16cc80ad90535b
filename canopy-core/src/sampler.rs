//! Orientation Sampling from the Device Tilt Sensor
//!
//! ## Overview
//!
//! The sampler sits between the platform's tilt hardware and the rest of
//! the engine. It owns the sensor handle, applies zero-offset calibration,
//! and pushes [`OrientationSample`]s to a sink callback in non-decreasing
//! timestamp order. Delivery is push-based and decoupled from the stability
//! tick: the platform drives [`OrientationSampler::poll`] at sensor rate,
//! the session drives the gate at its own fixed interval.
//!
//! ## The hardware seam
//!
//! [`TiltSensor`] is the only contact point with real hardware. Reads use
//! `nb::Result`, so a transient "no new frame yet" (`WouldBlock`) is
//! distinct from a hard fault, and both are distinct from the start-time
//! failures (`UnsupportedDevice`, `PermissionDenied`) that the calling UI
//! must present differently.
//!
//! ## Roll correction
//!
//! The reported elevation angle is not the raw pitch. When the device is
//! rolled about its forward axis, the pitch axis no longer lies in the
//! vertical plane, and the raw pitch overstates the elevation:
//!
//! ```text
//! elevation = atan(tan(pitch) * cos(roll))
//! ```
//!
//! At roll = 0 this is exactly the pitch; as |roll| grows the effective
//! angle shrinks toward zero.

use crate::{
    errors::{MeasureError, MeasureResult},
    time::Timestamp,
};

/// Permission status of the underlying tilt sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    /// Not yet requested
    Unknown,
    /// User granted access
    Granted,
    /// User or platform refused access
    Denied,
    /// Hardware has no usable sensor
    Unsupported,
}

/// Hard sensor fault during a read.
///
/// Transient "nothing new yet" is `nb::Error::WouldBlock`, not a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorFault {
    /// The platform reported a read failure; retry next poll
    ReadFailed,
}

/// Raw tilt reading straight from the platform, radians, uncorrected
#[derive(Debug, Clone, Copy)]
pub struct RawTilt {
    /// Rotation about the device's transverse axis
    pub pitch_rad: f32,
    /// Rotation about the device's forward axis
    pub roll_rad: f32,
    /// Heading, when the platform provides one
    pub yaw_rad: Option<f32>,
}

/// One processed orientation sample
///
/// Pitch is the roll-corrected elevation relative to the calibrated zero;
/// the raw device pitch never leaves the sampler. Immutable; consumed into
/// the session's sample window.
#[derive(Debug, Clone, Copy)]
pub struct OrientationSample {
    /// Timestamp in milliseconds
    pub timestamp: Timestamp,
    /// Roll-corrected, zero-offset elevation in radians
    pub pitch_rad: f32,
    /// Device roll in radians
    pub roll_rad: f32,
    /// Heading in radians, when available
    pub yaw_rad: Option<f32>,
}

/// Roll-corrected elevation angle: `atan(tan(pitch) * cos(roll))`.
///
/// Degrades gracefully to the raw pitch as roll approaches zero and
/// shrinks in magnitude as the device tips sideways.
pub fn elevation_angle(pitch_rad: f32, roll_rad: f32) -> f32 {
    libm::atanf(libm::tanf(pitch_rad) * libm::cosf(roll_rad))
}

/// The hardware seam: a non-blocking tilt sensor.
///
/// Platform layers implement this over the OS orientation API. The
/// permission request is the one operation allowed to suspend on user
/// interaction; it runs before sampling starts and the platform layer is
/// responsible for cancelling it if the session is torn down mid-request.
pub trait TiltSensor {
    /// Whether this hardware has a usable tilt sensor at all
    fn is_supported(&self) -> bool;

    /// Ask the platform for sensor access.
    ///
    /// May block on user interaction. Idempotent once resolved.
    fn request_permission(&mut self) -> PermissionState;

    /// Read the current tilt.
    ///
    /// `WouldBlock` means no new frame since the last read.
    fn read(&mut self) -> nb::Result<RawTilt, SensorFault>;

    /// Release the underlying handle. Called on stop; must be idempotent.
    fn release(&mut self) {}
}

/// Continuous orientation sampler with zero-offset calibration
pub struct OrientationSampler<S: TiltSensor> {
    sensor: S,
    running: bool,
    permission: PermissionState,
    zero_offset_rad: f32,
    last_timestamp: Timestamp,
}

impl<S: TiltSensor> OrientationSampler<S> {
    /// Wrap a tilt sensor. The sampler starts stopped and uncalibrated.
    pub fn new(sensor: S) -> Self {
        Self {
            sensor,
            running: false,
            permission: PermissionState::Unknown,
            zero_offset_rad: 0.0,
            last_timestamp: 0,
        }
    }

    /// Begin sampling.
    ///
    /// Fails with [`MeasureError::UnsupportedDevice`] when the hardware has
    /// no sensor and [`MeasureError::PermissionDenied`] when access is
    /// refused - the two cases the calling UI must distinguish from a bad
    /// reading later on.
    pub fn start(&mut self) -> MeasureResult<()> {
        if self.running {
            return Ok(());
        }

        if !self.sensor.is_supported() {
            self.permission = PermissionState::Unsupported;
            return Err(MeasureError::UnsupportedDevice);
        }

        self.permission = self.sensor.request_permission();
        match self.permission {
            PermissionState::Granted => {
                self.running = true;
                #[cfg(feature = "log")]
                log::debug!("orientation sampler started");
                Ok(())
            }
            PermissionState::Unsupported => Err(MeasureError::UnsupportedDevice),
            _ => Err(MeasureError::PermissionDenied),
        }
    }

    /// Stop sampling and release the sensor handle.
    ///
    /// Idempotent; after return no further samples are delivered, even if
    /// a poll races with teardown.
    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            self.sensor.release();
            #[cfg(feature = "log")]
            log::debug!("orientation sampler stopped");
        }
    }

    /// Whether the sampler is currently delivering samples
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Last resolved permission state
    pub fn permission(&self) -> PermissionState {
        self.permission
    }

    /// Record the current instantaneous pitch as the new relative zero.
    ///
    /// Subsequent samples report `raw - zero`. Reads the sensor directly,
    /// so it propagates `WouldBlock` when no frame is available yet.
    pub fn calibrate_zero(&mut self) -> nb::Result<(), SensorFault> {
        let raw = self.sensor.read()?;
        self.zero_offset_rad = raw.pitch_rad;
        Ok(())
    }

    /// The stored zero offset in radians
    pub fn zero_offset(&self) -> f32 {
        self.zero_offset_rad
    }

    /// Poll the sensor once, delivering a processed sample to `sink`.
    ///
    /// Processing applies the zero offset to the raw pitch and then the
    /// roll correction, so `pitch_rad` on the delivered sample is the
    /// elevation angle the rest of the engine works in.
    ///
    /// Returns the delivered sample for callers that also want it inline.
    /// When stopped, or when `now` precedes an already-delivered sample
    /// (which would break the window's ordering invariant), nothing is
    /// delivered and `WouldBlock` is returned.
    pub fn poll<F>(&mut self, now: Timestamp, sink: &mut F) -> nb::Result<OrientationSample, SensorFault>
    where
        F: FnMut(OrientationSample),
    {
        if !self.running {
            return Err(nb::Error::WouldBlock);
        }
        if now < self.last_timestamp {
            return Err(nb::Error::WouldBlock);
        }

        let raw = self.sensor.read()?;
        let sample = OrientationSample {
            timestamp: now,
            pitch_rad: elevation_angle(raw.pitch_rad - self.zero_offset_rad, raw.roll_rad),
            roll_rad: raw.roll_rad,
            yaw_rad: raw.yaw_rad,
        };

        self.last_timestamp = now;
        sink(sample);
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DEG_PER_RAD, RAD_PER_DEG};

    /// Scripted sensor for tests
    struct FakeTilt {
        supported: bool,
        permission: PermissionState,
        pitch_rad: f32,
        roll_rad: f32,
        released: bool,
    }

    impl FakeTilt {
        fn granted(pitch_rad: f32, roll_rad: f32) -> Self {
            Self {
                supported: true,
                permission: PermissionState::Granted,
                pitch_rad,
                roll_rad,
                released: false,
            }
        }
    }

    impl TiltSensor for FakeTilt {
        fn is_supported(&self) -> bool {
            self.supported
        }

        fn request_permission(&mut self) -> PermissionState {
            self.permission
        }

        fn read(&mut self) -> nb::Result<RawTilt, SensorFault> {
            Ok(RawTilt {
                pitch_rad: self.pitch_rad,
                roll_rad: self.roll_rad,
                yaw_rad: None,
            })
        }

        fn release(&mut self) {
            self.released = true;
        }
    }

    #[test]
    fn elevation_equals_pitch_at_zero_roll() {
        for pitch_deg in [-60.0_f32, -10.0, 0.0, 15.0, 45.0, 70.0] {
            let pitch = pitch_deg * RAD_PER_DEG;
            assert!((elevation_angle(pitch, 0.0) - pitch).abs() < 1e-6);
        }
    }

    #[test]
    fn elevation_magnitude_shrinks_with_roll() {
        let pitch = 30.0 * RAD_PER_DEG;
        let mut previous = elevation_angle(pitch, 0.0).abs();
        for roll_deg in [5.0_f32, 15.0, 30.0, 60.0, 85.0] {
            let e = elevation_angle(pitch, roll_deg * RAD_PER_DEG).abs();
            assert!(e < previous, "expected shrink at roll {}°", roll_deg);
            previous = e;
        }
    }

    #[test]
    fn unsupported_and_denied_fail_distinctly() {
        let mut sampler = OrientationSampler::new(FakeTilt {
            supported: false,
            permission: PermissionState::Unknown,
            pitch_rad: 0.0,
            roll_rad: 0.0,
            released: false,
        });
        assert_eq!(sampler.start(), Err(MeasureError::UnsupportedDevice));

        let mut sampler = OrientationSampler::new(FakeTilt {
            supported: true,
            permission: PermissionState::Denied,
            pitch_rad: 0.0,
            roll_rad: 0.0,
            released: false,
        });
        assert_eq!(sampler.start(), Err(MeasureError::PermissionDenied));
    }

    #[test]
    fn zero_calibration_offsets_pitch() {
        let mut sampler = OrientationSampler::new(FakeTilt::granted(0.3, 0.0));
        sampler.start().unwrap();
        sampler.calibrate_zero().unwrap();
        assert!((sampler.zero_offset() - 0.3).abs() < 1e-6);

        let mut delivered = None;
        sampler.poll(100, &mut |s| delivered = Some(s)).unwrap();
        let sample = delivered.unwrap();
        assert!(sample.pitch_rad.abs() < 1e-6);
    }

    #[test]
    fn delivered_pitch_is_roll_corrected() {
        // 30° pitch at 60° roll: atan(tan(30°)·cos(60°)) ≈ 16.10°, a far
        // cry from the raw pitch
        let pitch = 30.0 * RAD_PER_DEG;
        let roll = 60.0 * RAD_PER_DEG;
        let mut sampler = OrientationSampler::new(FakeTilt::granted(pitch, roll));
        sampler.start().unwrap();

        let mut delivered = None;
        sampler.poll(100, &mut |s| delivered = Some(s)).unwrap();
        let sample = delivered.unwrap();

        assert!((sample.pitch_rad - elevation_angle(pitch, roll)).abs() < 1e-6);
        assert!((sample.pitch_rad * DEG_PER_RAD - 16.10).abs() < 0.01);
        assert_eq!(sample.roll_rad, roll);
    }

    #[test]
    fn roll_correction_applies_after_zero_offset() {
        // Calibrated against a 5° mounting bias, then a rolled reading:
        // the correction must act on the offset pitch, not the raw one
        let bias = 5.0 * RAD_PER_DEG;
        let roll = 30.0 * RAD_PER_DEG;
        let mut sampler = OrientationSampler::new(FakeTilt::granted(bias, 0.0));
        sampler.start().unwrap();
        sampler.calibrate_zero().unwrap();

        sampler.sensor.pitch_rad = bias + 20.0 * RAD_PER_DEG;
        sampler.sensor.roll_rad = roll;

        let mut delivered = None;
        sampler.poll(100, &mut |s| delivered = Some(s)).unwrap();
        let sample = delivered.unwrap();

        let expected = elevation_angle(20.0 * RAD_PER_DEG, roll);
        assert!((sample.pitch_rad - expected).abs() < 1e-6);
    }

    #[test]
    fn stop_is_idempotent_and_silences_delivery() {
        let mut sampler = OrientationSampler::new(FakeTilt::granted(0.1, 0.0));
        sampler.start().unwrap();

        let mut count = 0;
        sampler.poll(10, &mut |_| count += 1).unwrap();
        assert_eq!(count, 1);

        sampler.stop();
        sampler.stop(); // second stop must be safe

        assert!(matches!(
            sampler.poll(20, &mut |_| count += 1),
            Err(nb::Error::WouldBlock)
        ));
        assert_eq!(count, 1);
        assert!(!sampler.is_running());
    }

    #[test]
    fn delivery_preserves_timestamp_order() {
        let mut sampler = OrientationSampler::new(FakeTilt::granted(0.1, 0.0));
        sampler.start().unwrap();

        let mut timestamps = heapless::Vec::<u64, 8>::new();
        sampler.poll(100, &mut |s| timestamps.push(s.timestamp).unwrap()).unwrap();
        // A stale poll must not deliver out of order
        assert!(matches!(
            sampler.poll(50, &mut |s| timestamps.push(s.timestamp).unwrap()),
            Err(nb::Error::WouldBlock)
        ));
        sampler.poll(150, &mut |s| timestamps.push(s.timestamp).unwrap()).unwrap();

        assert_eq!(&timestamps[..], &[100, 150]);
    }
}
