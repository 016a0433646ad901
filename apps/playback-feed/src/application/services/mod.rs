//! Application Services
//!
//! - `driver`: periodic tick scheduler and the dispatch gate
//! - `bridge`: decides when the chart sees a frame
//! - `session`: the playback system assembled as one unit

pub mod bridge;
pub mod driver;
pub mod session;

pub use bridge::RenderBridge;
pub use driver::{ClockDriver, DispatchGate, DriverConfig, DriverError, DriverState, TickPolicy};
pub use session::{PlaybackContext, PlaybackSession, SessionConfig, SessionStatus};
