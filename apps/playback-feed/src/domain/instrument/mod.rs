//! Instrument Identifiers
//!
//! An instrument is an opaque, comparable string token. The universe is the
//! fixed, ordered set of instruments chosen at startup; membership never
//! changes at runtime.

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::{PlaybackError, UniverseError};

/// Base tickers used to generate the default universe.
const BASE_TICKERS: [&str; 15] = [
    "AAPL", "MSFT", "GOOG", "AMZN", "META", "NVDA", "TSLA", "AMD", "NFLX", "INTC", "AVGO", "ORCL",
    "CRM", "ADBE", "CSCO",
];

// =============================================================================
// Instrument
// =============================================================================

/// A tracked instrument identifier.
///
/// Identifiers are kept verbatim; no case normalization is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instrument(String);

impl Instrument {
    /// Create a new instrument identifier.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Identifier length in characters, used as the waveform phase offset.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Instrument {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Instrument {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// =============================================================================
// Instrument Universe
// =============================================================================

/// The closed, ordered set of instruments the feed ticks.
///
/// # Example
///
/// ```rust
/// use playback_feed::domain::instrument::InstrumentUniverse;
///
/// let universe = InstrumentUniverse::generated(100).unwrap();
/// assert_eq!(universe.len(), 100);
/// assert_eq!(universe.first().as_str(), "AAPL1");
/// assert!(universe.contains("CSCO15"));
/// ```
#[derive(Debug, Clone)]
pub struct InstrumentUniverse {
    members: Vec<Instrument>,
    index: HashSet<Instrument>,
}

impl InstrumentUniverse {
    /// Build a universe from identifiers, preserving their order.
    ///
    /// # Errors
    ///
    /// Returns `UniverseError` if the list is empty, contains a blank
    /// identifier, or repeats an identifier.
    pub fn new<I, S>(identifiers: I) -> Result<Self, UniverseError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut members = Vec::new();
        let mut index = HashSet::new();

        for raw in identifiers {
            let instrument = Instrument::new(raw);
            if instrument.as_str().trim().is_empty() {
                return Err(UniverseError::BlankIdentifier);
            }
            if !index.insert(instrument.clone()) {
                return Err(UniverseError::Duplicate(instrument.into_inner()));
            }
            members.push(instrument);
        }

        if members.is_empty() {
            return Err(UniverseError::Empty);
        }

        Ok(Self { members, index })
    }

    /// Generate a universe of `size` identifiers from the base tickers.
    ///
    /// The `i`-th identifier (0-based) is the base ticker at `i % 15`
    /// followed by `i + 1`, e.g. `AAPL1`, `MSFT2`, ..., `AAPL16`.
    ///
    /// # Errors
    ///
    /// Returns `UniverseError::Empty` when `size` is zero.
    pub fn generated(size: usize) -> Result<Self, UniverseError> {
        Self::new(
            (0..size).map(|i| format!("{}{}", BASE_TICKERS[i % BASE_TICKERS.len()], i + 1)),
        )
    }

    /// Check whether an identifier is a member.
    #[must_use]
    pub fn contains(&self, instrument: &str) -> bool {
        self.index.contains(instrument)
    }

    /// Resolve an identifier to its universe member.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::UnknownInstrument` if it is not a member.
    pub fn resolve(&self, instrument: &str) -> Result<&Instrument, PlaybackError> {
        self.index
            .get(instrument)
            .ok_or_else(|| PlaybackError::UnknownInstrument(instrument.to_string()))
    }

    /// Member at a position in universe order.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&Instrument> {
        self.members.get(position)
    }

    /// First member; a universe is never empty.
    #[must_use]
    pub fn first(&self) -> &Instrument {
        &self.members[0]
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the universe has no members; never true once built.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterate members in universe order.
    pub fn iter(&self) -> impl Iterator<Item = &Instrument> {
        self.members.iter()
    }

    /// Members in universe order.
    #[must_use]
    pub fn as_slice(&self) -> &[Instrument] {
        &self.members
    }
}

// =============================================================================
// Tests
// =============================================================================
