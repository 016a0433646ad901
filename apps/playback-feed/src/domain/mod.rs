//! Domain Layer - Instruments, series windows and selection.
//!
//! This layer contains the core playback types with no I/O. Everything here
//! is synchronous and owned; the application layer decides how it is shared.

/// Domain errors for observations, selection and universe construction.
pub mod errors;

/// Instrument identifiers and the fixed instrument universe.
pub mod instrument;

/// Observations, points and the windowed series store.
pub mod series;

/// Active instrument tracking.
pub mod selection;

/// Synthetic tick generation.
pub mod tick;
