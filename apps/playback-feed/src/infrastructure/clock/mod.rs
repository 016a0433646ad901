//! Time Sources
//!
//! `SystemTimeSource` reads wall-clock time; `ManualTimeSource` is set by
//! hand for tests and replays.

use chrono::Utc;
use parking_lot::RwLock;

use crate::application::ports::TimeSource;

/// Wall-clock virtual time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    #[allow(clippy::cast_precision_loss)]
    fn now_secs(&self) -> f64 {
        Utc::now().timestamp_millis() as f64 / 1_000.0
    }
}

/// Virtual time that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    now: RwLock<f64>,
}

impl ManualTimeSource {
    /// Create a clock reading `start` seconds.
    #[must_use]
    pub const fn new(start: f64) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Jump to `secs`.
    pub fn set(&self, secs: f64) {
        *self.now.write() = secs;
    }

    /// Move forward by `secs`.
    pub fn advance(&self, secs: f64) {
        *self.now.write() += secs;
    }
}

impl TimeSource for ManualTimeSource {
    fn now_secs(&self) -> f64 {
        *self.now.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_time_is_after_2020() {
        assert!(SystemTimeSource.now_secs() > 1_577_836_800.0);
    }

    #[test]
    fn manual_time_moves_only_when_told() {
        let clock = ManualTimeSource::new(10.0);
        assert!((clock.now_secs() - 10.0).abs() < f64::EPSILON);
        clock.advance(1.5);
        assert!((clock.now_secs() - 11.5).abs() < f64::EPSILON);
        clock.set(3.0);
        assert!((clock.now_secs() - 3.0).abs() < f64::EPSILON);
    }
}
