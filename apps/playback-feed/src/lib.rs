#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Playback Feed - Simulated Multi-Instrument Price Stream
//!
//! Ticks a synthetic price feed across a fixed instrument universe, keeps a
//! bounded time-series window per instrument and renders the window of the
//! one instrument the operator has selected.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core playback types with no I/O
//!   - `instrument`: Identifiers and the instrument universe
//!   - `series`: Observations and the windowed series store
//!   - `selection`: Active instrument
//!   - `tick`: Synthetic tick generator
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Chart, tick subscriber and time source interfaces
//!   - `services`: Clock driver, render bridge, playback session
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `broadcast`: Chart frame fan-out over a broadcast channel
//!   - `clock`: Wall-clock and manual time sources
//!   - `config`: Environment configuration
//!   - `http`: Control, health and metrics endpoint
//!   - `metrics`: Prometheus recorder and recording functions
//!
//! Dependencies point inward, with one exception: application services call
//! the `metrics` recording functions directly. Those functions only touch the
//! global `metrics` facade and are no-ops without a recorder.
//!
//! # Data Flow
//!
//! ```text
//!  ClockDriver ──tick──► SeriesStore ──active only──► RenderBridge ──► ChartPort
//!       ▲                     ▲                             ▲
//!  start/stop            reset/ingest                    select
//!       └──────────── PlaybackSession (dispatch gate) ──────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core playback types with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::errors::{ObservationDefect, PlaybackError, UniverseError};
pub use domain::instrument::{Instrument, InstrumentUniverse};
pub use domain::series::{ApplyOutcome, Observation, Point, SeriesStore};
pub use domain::tick::{TickGenerator, TickProfile};

// Ports and services
pub use application::ports::{ChartFrame, ChartPort, FrameReason, ObservationSubscriber, TimeSource};
pub use application::services::{
    ClockDriver, DispatchGate, DriverConfig, DriverError, PlaybackSession, SessionConfig,
    SessionStatus, TickPolicy,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, PlaybackConfig};

// Adapters
pub use infrastructure::broadcast::{ChartBroadcast, SharedChartBroadcast};
pub use infrastructure::clock::{ManualTimeSource, SystemTimeSource};
pub use infrastructure::http::{ControlServer, ControlServerError, ControlState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
