//! Chart Frame Broadcast
//!
//! `ChartPort` adapter that fans frames out over a tokio broadcast channel,
//! so any number of in-process renderers can follow the active window.
//! Publishing never blocks: slow receivers lag and skip frames, which is
//! harmless because every frame carries the full window.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::application::ports::{ChartFrame, ChartPort};
use crate::infrastructure::config::BroadcastSettings;

/// Broadcast-backed chart port.
///
/// # Example
///
/// ```rust
/// use playback_feed::infrastructure::broadcast::ChartBroadcast;
///
/// let chart = ChartBroadcast::new(16);
/// let mut rx = chart.subscribe();
/// assert_eq!(chart.receiver_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ChartBroadcast {
    frames_tx: broadcast::Sender<ChartFrame>,
}

impl ChartBroadcast {
    /// Create a channel holding up to `capacity` undelivered frames.
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            frames_tx: broadcast::channel(capacity.max(1)).0,
        }
    }

    /// Create a channel sized from settings.
    #[must_use]
    pub fn from_settings(settings: &BroadcastSettings) -> Self {
        Self::new(settings.chart_frames_capacity)
    }

    /// Get a new receiver for chart frames.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChartFrame> {
        self.frames_tx.subscribe()
    }

    /// Get the number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.frames_tx.receiver_count()
    }
}

impl ChartPort for ChartBroadcast {
    fn publish(&self, frame: ChartFrame) {
        if self.frames_tx.send(frame).is_err() {
            tracing::trace!("No chart receivers, frame dropped");
        }
    }
}

/// Shared chart broadcast reference.
pub type SharedChartBroadcast = Arc<ChartBroadcast>;

// =============================================================================
// Tests
// =============================================================================
