//! Active Instrument Selection
//!
//! Tracks the single instrument currently rendered. Selection never touches
//! series content, so switching away and back reveals every update that
//! accumulated in the meantime.

use std::sync::Arc;

use super::errors::PlaybackError;
use super::instrument::{Instrument, InstrumentUniverse};

/// Holds the active instrument; always a member of the universe.
#[derive(Debug, Clone)]
pub struct SelectionController {
    universe: Arc<InstrumentUniverse>,
    active: Instrument,
}

impl SelectionController {
    /// Create a controller with an initial active instrument.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::UnknownInstrument` if `initial` is not a
    /// member of the universe.
    pub fn new(universe: Arc<InstrumentUniverse>, initial: &str) -> Result<Self, PlaybackError> {
        let active = universe.resolve(initial)?.clone();
        Ok(Self { universe, active })
    }

    /// Make `instrument` the active instrument.
    ///
    /// Returns `true` if the active instrument changed.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::UnknownInstrument` and leaves the selection
    /// unchanged if `instrument` is not a member of the universe.
    pub fn select(&mut self, instrument: &str) -> Result<bool, PlaybackError> {
        let resolved = self.universe.resolve(instrument)?;
        if *resolved == self.active {
            return Ok(false);
        }
        self.active = resolved.clone();
        Ok(true)
    }

    /// The active instrument.
    #[must_use]
    pub const fn active(&self) -> &Instrument {
        &self.active
    }

    /// Whether `instrument` is the active instrument.
    #[must_use]
    pub fn is_active(&self, instrument: &Instrument) -> bool {
        self.active == *instrument
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn universe() -> Arc<InstrumentUniverse> {
        Arc::new(InstrumentUniverse::new(["AAPL1", "MSFT2", "GOOG3"]).unwrap())
    }

    #[test]
    fn starts_on_initial_instrument() {
        let selection = SelectionController::new(universe(), "MSFT2").unwrap();
        assert_eq!(selection.active().as_str(), "MSFT2");
    }

    #[test]
    fn unknown_initial_is_rejected() {
        let err = SelectionController::new(universe(), "AAPL").unwrap_err();
        assert_eq!(err, PlaybackError::UnknownInstrument("AAPL".to_string()));
    }

    #[test]
    fn select_switches_active() {
        let mut selection = SelectionController::new(universe(), "AAPL1").unwrap();
        assert!(selection.select("GOOG3").unwrap());
        assert_eq!(selection.active().as_str(), "GOOG3");
        assert!(selection.is_active(&Instrument::new("GOOG3")));
        assert!(!selection.is_active(&Instrument::new("AAPL1")));
    }

    #[test]
    fn reselecting_active_reports_no_change() {
        let mut selection = SelectionController::new(universe(), "AAPL1").unwrap();
        assert!(!selection.select("AAPL1").unwrap());
    }

    #[test]
    fn unknown_select_leaves_selection_unchanged() {
        let mut selection = SelectionController::new(universe(), "AAPL1").unwrap();
        let err = selection.select("TSLA7").unwrap_err();
        assert_eq!(err, PlaybackError::UnknownInstrument("TSLA7".to_string()));
        assert_eq!(selection.active().as_str(), "AAPL1");
    }
}
