//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with external systems.

/// Port interfaces for the chart, tick subscribers and the virtual clock.
pub mod ports;

/// Clock driver, render bridge and the playback session.
pub mod services;
