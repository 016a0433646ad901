//! Domain errors for the playback feed.
//!
//! None of these are fatal: a rejected operation leaves the store and the
//! selection exactly as they were.

/// Why an observation was rejected by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ObservationDefect {
    /// Value is NaN or infinite.
    #[error("value is not finite")]
    NonFiniteValue,
    /// Timestamp has a fractional part or is not a number.
    #[error("timestamp is not an integer-valued second")]
    FractionalTimestamp,
    /// Timestamp does not fit in a signed 64-bit second count.
    #[error("timestamp is out of range")]
    TimestampOutOfRange,
}

impl ObservationDefect {
    /// Metric label for this defect.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NonFiniteValue => "non_finite_value",
            Self::FractionalTimestamp => "fractional_timestamp",
            Self::TimestampOutOfRange => "timestamp_out_of_range",
        }
    }
}

/// Errors raised by store and selection operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    /// Observation was malformed and was not applied.
    #[error("invalid observation for {instrument}: {defect}")]
    InvalidObservation {
        /// Instrument the observation was addressed to.
        instrument: String,
        /// What was wrong with it.
        defect: ObservationDefect,
    },

    /// Identifier is not a member of the configured universe.
    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),
}

impl PlaybackError {
    /// Short label used for metrics and API error codes.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidObservation { .. } => "INVALID_OBSERVATION",
            Self::UnknownInstrument(_) => "UNKNOWN_INSTRUMENT",
        }
    }
}

/// Errors raised while building an instrument universe.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UniverseError {
    /// No identifiers were supplied.
    #[error("instrument universe is empty")]
    Empty,
    /// An identifier was blank.
    #[error("instrument identifier cannot be empty")]
    BlankIdentifier,
    /// The same identifier appeared twice.
    #[error("duplicate instrument in universe: {0}")]
    Duplicate(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_observation_message_names_instrument_and_defect() {
        let err = PlaybackError::InvalidObservation {
            instrument: "AAPL1".to_string(),
            defect: ObservationDefect::NonFiniteValue,
        };
        assert_eq!(
            err.to_string(),
            "invalid observation for AAPL1: value is not finite"
        );
        assert_eq!(err.code(), "INVALID_OBSERVATION");
    }

    #[test]
    fn unknown_instrument_code() {
        let err = PlaybackError::UnknownInstrument("ZZZ".to_string());
        assert_eq!(err.code(), "UNKNOWN_INSTRUMENT");
        assert_eq!(err.to_string(), "unknown instrument: ZZZ");
    }

    #[test]
    fn defect_labels() {
        assert_eq!(ObservationDefect::NonFiniteValue.as_str(), "non_finite_value");
        assert_eq!(
            ObservationDefect::FractionalTimestamp.as_str(),
            "fractional_timestamp"
        );
        assert_eq!(
            ObservationDefect::TimestampOutOfRange.as_str(),
            "timestamp_out_of_range"
        );
    }
}
