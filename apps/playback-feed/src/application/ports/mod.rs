//! Port Interfaces
//!
//! Contracts between the playback core and its collaborators, following the
//! Hexagonal Architecture pattern.
//!
//! ## Driven Ports (Outbound)
//!
//! - `ChartPort`: presentation layer receiving the active window
//! - `TimeSource`: virtual clock read by the tick cycle
//!
//! ## Driver Ports (Inbound)
//!
//! - `ObservationSubscriber`: receives every observation the clock driver emits

use serde::Serialize;

use crate::domain::instrument::Instrument;
use crate::domain::series::{Observation, Point};

/// Why a frame was published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameReason {
    /// An observation landed on the active instrument.
    Tick,
    /// The operator switched the active instrument.
    SelectionChanged,
    /// The store was cleared.
    Reset,
}

impl FrameReason {
    /// Metric label for this reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tick => "tick",
            Self::SelectionChanged => "selection_changed",
            Self::Reset => "reset",
        }
    }
}

/// The full current window of the active instrument.
///
/// Always the whole window, never a delta, so the chart can replace its data
/// without re-sorting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartFrame {
    /// Instrument being rendered.
    pub instrument: Instrument,
    /// Ordered points, oldest first.
    pub points: Vec<Point>,
    /// What triggered the publication.
    pub reason: FrameReason,
}

/// Presentation collaborator that renders the active window.
///
/// Called from inside the dispatch gate with no session state locked.
/// Implementations must not block; they may call back into the session.
#[cfg_attr(test, mockall::automock)]
pub trait ChartPort: Send + Sync {
    /// Render a frame.
    fn publish(&self, frame: ChartFrame);
}

/// Receives every observation emitted by the clock driver, in order.
pub trait ObservationSubscriber: Send + Sync {
    /// Handle one observation.
    fn on_observation(&self, observation: &Observation);
}

/// Virtual clock read once per tick.
pub trait TimeSource: Send + Sync {
    /// Current virtual time in (fractional) seconds.
    fn now_secs(&self) -> f64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_serializes_with_time_value_points() {
        let frame = ChartFrame {
            instrument: Instrument::new("AAPL1"),
            points: vec![Point::new(1, 100.5)],
            reason: FrameReason::SelectionChanged,
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "instrument": "AAPL1",
                "points": [{ "time": 1, "value": 100.5 }],
                "reason": "selection_changed",
            })
        );
    }
}
