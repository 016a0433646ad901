//! Windowed Series Store
//!
//! Owns one bounded time-series buffer per instrument and applies the
//! append-or-merge rule:
//!
//! - a strictly later timestamp appends a new point;
//! - an equal or earlier timestamp overwrites the value of the last point,
//!   keeping its timestamp (coalescing into the current bucket);
//! - the buffer is then trimmed from the front to at most `W` points.
//!
//! Every buffer therefore stays strictly increasing by timestamp with
//! `len <= W`. Buffers are created lazily on first observation and only
//! removed by [`SeriesStore::clear`].

use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use super::errors::{ObservationDefect, PlaybackError};
use super::instrument::Instrument;

// =============================================================================
// Points and Observations
// =============================================================================

/// One retained sample, delivered to the chart as `{ time, value }`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Integer seconds.
    #[serde(rename = "time")]
    pub timestamp: i64,
    /// Sample value.
    pub value: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// One price sample for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Instrument the sample belongs to.
    pub instrument: Instrument,
    /// Integer seconds; not guaranteed monotonic per instrument.
    pub timestamp: i64,
    /// Sample value.
    pub value: f64,
}

impl Observation {
    /// Create a new observation.
    #[must_use]
    pub const fn new(instrument: Instrument, timestamp: i64, value: f64) -> Self {
        Self {
            instrument,
            timestamp,
            value,
        }
    }

    /// Create an observation from a timestamp expressed as fractional seconds.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::InvalidObservation` if the timestamp is not an
    /// integer-valued second representable as `i64`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn from_secs_f64(
        instrument: Instrument,
        timestamp_secs: f64,
        value: f64,
    ) -> Result<Self, PlaybackError> {
        let defect = if !timestamp_secs.is_finite() || timestamp_secs.fract() != 0.0 {
            Some(ObservationDefect::FractionalTimestamp)
        } else if timestamp_secs < i64::MIN as f64 || timestamp_secs >= i64::MAX as f64 {
            Some(ObservationDefect::TimestampOutOfRange)
        } else {
            None
        };

        if let Some(defect) = defect {
            return Err(PlaybackError::InvalidObservation {
                instrument: instrument.into_inner(),
                defect,
            });
        }

        Ok(Self::new(instrument, timestamp_secs as i64, value))
    }

    /// Check that the observation can be applied.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::InvalidObservation` for a non-finite value.
    pub fn validate(&self) -> Result<(), PlaybackError> {
        if self.value.is_finite() {
            Ok(())
        } else {
            Err(PlaybackError::InvalidObservation {
                instrument: self.instrument.as_str().to_string(),
                defect: ObservationDefect::NonFiniteValue,
            })
        }
    }

    /// The point this observation would persist as.
    #[must_use]
    pub const fn point(&self) -> Point {
        Point::new(self.timestamp, self.value)
    }
}

/// What `apply` did to the target buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A new point was appended; `trimmed` points fell out of the window.
    Appended {
        /// Points dropped from the front.
        trimmed: usize,
    },
    /// The last point's value was overwritten.
    Coalesced,
}

impl ApplyOutcome {
    /// Metric label for this outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Appended { .. } => "appended",
            Self::Coalesced => "coalesced",
        }
    }
}

// =============================================================================
// Series Buffer
// =============================================================================

#[derive(Debug, Default)]
struct SeriesBuffer {
    points: VecDeque<Point>,
}

impl SeriesBuffer {
    fn push(&mut self, point: Point, window: usize) -> ApplyOutcome {
        let outcome = match self.points.back_mut() {
            Some(last) if point.timestamp <= last.timestamp => {
                last.value = point.value;
                ApplyOutcome::Coalesced
            }
            _ => {
                self.points.push_back(point);
                ApplyOutcome::Appended { trimmed: 0 }
            }
        };

        let excess = self.points.len().saturating_sub(window);
        if excess > 0 {
            self.points.drain(..excess);
        }

        match outcome {
            ApplyOutcome::Appended { .. } => ApplyOutcome::Appended { trimmed: excess },
            ApplyOutcome::Coalesced => ApplyOutcome::Coalesced,
        }
    }

    fn snapshot(&self) -> Vec<Point> {
        self.points.iter().copied().collect()
    }
}

// =============================================================================
// Series Store
// =============================================================================

/// Per-instrument bounded series buffers.
///
/// # Example
///
/// ```rust
/// use std::num::NonZeroUsize;
/// use playback_feed::domain::instrument::Instrument;
/// use playback_feed::domain::series::{Observation, Point, SeriesStore};
///
/// let mut store = SeriesStore::new(NonZeroUsize::new(500).unwrap());
/// let aapl = Instrument::new("AAPL1");
///
/// store.apply(&Observation::new(aapl.clone(), 10, 1.0)).unwrap();
/// store.apply(&Observation::new(aapl.clone(), 10, 2.0)).unwrap();
/// assert_eq!(store.view("AAPL1"), vec![Point::new(10, 2.0)]);
/// ```
#[derive(Debug)]
pub struct SeriesStore {
    window: NonZeroUsize,
    buffers: HashMap<Instrument, SeriesBuffer>,
}

impl SeriesStore {
    /// Create an empty store with window size `W`.
    #[must_use]
    pub fn new(window: NonZeroUsize) -> Self {
        Self {
            window,
            buffers: HashMap::new(),
        }
    }

    /// Apply one observation with the append-or-merge-with-trim rule.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::InvalidObservation` for a non-finite value;
    /// the store is not modified in that case.
    pub fn apply(&mut self, observation: &Observation) -> Result<ApplyOutcome, PlaybackError> {
        observation.validate()?;

        let window = self.window.get();
        let point = observation.point();

        if let Some(buffer) = self.buffers.get_mut(&observation.instrument) {
            return Ok(buffer.push(point, window));
        }

        let mut buffer = SeriesBuffer::default();
        let outcome = buffer.push(point, window);
        self.buffers.insert(observation.instrument.clone(), buffer);
        Ok(outcome)
    }

    /// Snapshot of an instrument's window, oldest first.
    ///
    /// Empty if the instrument has never been observed.
    #[must_use]
    pub fn view(&self, instrument: &str) -> Vec<Point> {
        self.buffers
            .get(instrument)
            .map(SeriesBuffer::snapshot)
            .unwrap_or_default()
    }

    /// Number of points retained for an instrument.
    #[must_use]
    pub fn len(&self, instrument: &str) -> usize {
        self.buffers.get(instrument).map_or(0, |b| b.points.len())
    }

    /// Most recent point for an instrument.
    #[must_use]
    pub fn last(&self, instrument: &str) -> Option<Point> {
        self.buffers
            .get(instrument)
            .and_then(|b| b.points.back().copied())
    }

    /// Number of instruments with a buffer.
    #[must_use]
    pub fn instrument_count(&self) -> usize {
        self.buffers.len()
    }

    /// Whether no instrument has been observed since creation or the last clear.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Window size `W`.
    #[must_use]
    pub const fn window(&self) -> NonZeroUsize {
        self.window
    }

    /// Drop every buffer.
    pub fn clear(&mut self) {
        self.buffers.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================
