//! Time-Bounded Sample Window for Pitch History
//!
//! ## Overview
//!
//! The stability gate and the capture path both need a sliding window of
//! recent pitch readings. Unlike a count-bounded ring buffer, this window is
//! bounded by *age*: it holds only samples from the last `span_ms`
//! milliseconds and evicts from the front as time advances (FIFO by age).
//!
//! The backing store is a fixed-capacity deque, so the sampling hot path
//! never allocates. If the sensor ever outruns the capacity inside one span,
//! the oldest sample is dropped first - recent data is always the more
//! valuable for steadiness decisions.
//!
//! ## Invariants
//!
//! - Timestamps are monotonically non-decreasing; an out-of-order push is
//!   discarded rather than reordered.
//! - After `evict_older_than(now)`, every sample satisfies
//!   `t >= now - span_ms`.
//!
//! ## Capture snapshots
//!
//! A capture takes the *median* of the window, not the mean - a single
//! outlier frame from a hand twitch should not drag the captured angle.
//! The sample standard deviation (Bessel's correction, n-1 denominator)
//! rides along for uncertainty propagation.

use heapless::Deque;

use crate::time::Timestamp;

/// Maximum samples one window can hold.
///
/// A 3 s window at a typical 100 Hz device-orientation rate is 300 samples;
/// 512 leaves headroom for faster sensors.
pub const WINDOW_CAPACITY: usize = 512;

/// One pitch reading inside the window
#[derive(Debug, Clone, Copy)]
pub struct PitchSample {
    /// Timestamp in milliseconds
    pub timestamp: Timestamp,
    /// Roll-corrected pitch in radians
    pub pitch_rad: f32,
}

/// Angle captured from a window snapshot
///
/// Created once per capture event and immutable thereafter. The median is
/// the value geometry runs on; the standard deviation feeds the Monte Carlo
/// uncertainty estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CapturedAngle {
    /// Median pitch over the snapshot window (radians)
    pub median_rad: f32,
    /// Sample standard deviation over the snapshot window (radians)
    pub std_dev_rad: f32,
    /// Device roll at the moment of capture (radians)
    pub roll_at_capture_rad: f32,
}

/// Age-bounded sliding window of pitch samples
pub struct SampleWindow {
    samples: Deque<PitchSample, WINDOW_CAPACITY>,
    span_ms: u64,
}

impl SampleWindow {
    /// Create an empty window spanning the last `span_ms` milliseconds
    pub fn new(span_ms: u64) -> Self {
        Self {
            samples: Deque::new(),
            span_ms,
        }
    }

    /// Window span in milliseconds
    pub fn span_ms(&self) -> u64 {
        self.span_ms
    }

    /// Number of samples currently held
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if no samples are held
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Push a sample, evicting anything that falls outside the span.
    ///
    /// Samples older than the newest already-held sample violate the
    /// ordering invariant and are dropped.
    pub fn push(&mut self, sample: PitchSample) {
        if let Some(back) = self.samples.back() {
            if sample.timestamp < back.timestamp {
                return;
            }
        }

        if self.samples.is_full() {
            self.samples.pop_front();
        }
        // Cannot fail: we just guaranteed a free slot
        let _ = self.samples.push_back(sample);

        self.evict_older_than(sample.timestamp);
    }

    /// Drop samples older than `now - span_ms`
    pub fn evict_older_than(&mut self, now: Timestamp) {
        let cutoff = now.saturating_sub(self.span_ms);
        while let Some(front) = self.samples.front() {
            if front.timestamp < cutoff {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Remove all samples
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Timestamp of the newest sample
    pub fn latest_timestamp(&self) -> Option<Timestamp> {
        self.samples.back().map(|s| s.timestamp)
    }

    /// Milliseconds covered by the held samples
    pub fn span_covered_ms(&self) -> u64 {
        match (self.samples.front(), self.samples.back()) {
            (Some(first), Some(last)) => last.timestamp.saturating_sub(first.timestamp),
            _ => 0,
        }
    }

    /// Median pitch of the held samples (radians)
    pub fn median(&self) -> Option<f32> {
        if self.samples.is_empty() {
            return None;
        }

        let mut pitches: heapless::Vec<f32, WINDOW_CAPACITY> = heapless::Vec::new();
        for s in self.samples.iter() {
            // Capacity matches the deque, push cannot fail
            let _ = pitches.push(s.pitch_rad);
        }
        pitches.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(core::cmp::Ordering::Equal));

        let n = pitches.len();
        let median = if n % 2 == 1 {
            pitches[n / 2]
        } else {
            0.5 * (pitches[n / 2 - 1] + pitches[n / 2])
        };
        Some(median)
    }

    /// Sample standard deviation of pitch (radians), Bessel-corrected.
    ///
    /// Returns `None` with fewer than two samples, where the n-1
    /// denominator is undefined.
    pub fn std_dev(&self) -> Option<f32> {
        let n = self.samples.len();
        if n < 2 {
            return None;
        }

        let mut sum = 0.0_f32;
        for s in self.samples.iter() {
            sum += s.pitch_rad;
        }
        let mean = sum / n as f32;

        let mut sq_sum = 0.0_f32;
        for s in self.samples.iter() {
            let d = s.pitch_rad - mean;
            sq_sum += d * d;
        }

        Some(libm::sqrtf(sq_sum / (n as f32 - 1.0)))
    }

    /// Freeze the current window into a [`CapturedAngle`].
    ///
    /// `roll_rad` is the device roll at the capture instant, reported by
    /// the sampler alongside the pitch stream. Returns `None` on an empty
    /// window; a single-sample window yields zero standard deviation.
    pub fn snapshot(&self, roll_rad: f32) -> Option<CapturedAngle> {
        let median_rad = self.median()?;
        let std_dev_rad = self.std_dev().unwrap_or(0.0);
        Some(CapturedAngle {
            median_rad,
            std_dev_rad,
            roll_at_capture_rad: roll_rad,
        })
    }
}
