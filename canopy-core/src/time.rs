//! Time management for the measurement session
//!
//! Provides a clock abstraction so the engine never reads wall time
//! directly. Samples carry timestamps from the platform layer; the
//! stability tick and cooldown math only subtract them, so any
//! monotonic millisecond source works:
//! - System clock (when std is available)
//! - Platform animation/sensor clock on mobile targets
//! - Fixed source for deterministic tests

/// Timestamp in milliseconds since an arbitrary monotonic origin
pub type Timestamp = u64;

/// Source of time for the session
pub trait TimeSource {
    /// Get current timestamp in milliseconds
    fn now(&self) -> Timestamp;
}

/// System time source (requires std)
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct SystemTime;

#[cfg(feature = "std")]
impl TimeSource for SystemTime {
    fn now(&self) -> Timestamp {
        use std::time::{SystemTime as StdSystemTime, UNIX_EPOCH};

        StdSystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }
}

/// Fixed time source for testing
#[derive(Debug, Clone)]
pub struct FixedTime {
    timestamp: Timestamp,
}

impl FixedTime {
    /// Create a fixed source starting at `timestamp`
    pub fn new(timestamp: Timestamp) -> Self {
        Self { timestamp }
    }

    /// Set the current time
    pub fn set(&mut self, timestamp: Timestamp) {
        self.timestamp = timestamp;
    }

    /// Advance the current time by `ms`
    pub fn advance(&mut self, ms: u64) {
        self.timestamp += ms;
    }
}

impl TimeSource for FixedTime {
    fn now(&self) -> Timestamp {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_time_advances() {
        let mut time = FixedTime::new(1000);
        assert_eq!(time.now(), 1000);

        time.advance(500);
        assert_eq!(time.now(), 1500);
    }

    #[cfg(feature = "std")]
    #[test]
    fn system_time_is_nonzero_and_monotone() {
        let clock = SystemTime;
        let first = clock.now();
        let second = clock.now();
        assert!(first > 0);
        assert!(second >= first);
    }
}
