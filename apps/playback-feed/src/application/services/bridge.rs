//! Render Bridge
//!
//! Decides when the chart sees a new frame. Only the active instrument is
//! ever rendered, and every frame carries its full window.

use std::sync::Arc;

use crate::application::ports::{ChartFrame, ChartPort, FrameReason};
use crate::domain::instrument::Instrument;
use crate::domain::selection::SelectionController;
use crate::domain::series::{Observation, SeriesStore};
use crate::infrastructure::metrics;

/// Publishes the active window to a `ChartPort`.
///
/// Frame construction is separate from publication so callers can build a
/// frame under their own lock and publish it after releasing that lock.
#[derive(Clone)]
pub struct RenderBridge {
    chart: Arc<dyn ChartPort>,
}

impl RenderBridge {
    /// Create a bridge publishing to `chart`.
    #[must_use]
    pub fn new(chart: Arc<dyn ChartPort>) -> Self {
        Self { chart }
    }

    /// Frame for an applied observation, if it hit the active instrument.
    #[must_use]
    pub fn applied_frame(
        observation: &Observation,
        selection: &SelectionController,
        store: &SeriesStore,
    ) -> Option<ChartFrame> {
        selection
            .is_active(&observation.instrument)
            .then(|| Self::frame(selection.active(), store, FrameReason::Tick))
    }

    /// Frame for the newly active instrument.
    #[must_use]
    pub fn selection_frame(selection: &SelectionController, store: &SeriesStore) -> ChartFrame {
        Self::frame(selection.active(), store, FrameReason::SelectionChanged)
    }

    /// The (empty) active window after a reset.
    #[must_use]
    pub fn reset_frame(selection: &SelectionController, store: &SeriesStore) -> ChartFrame {
        Self::frame(selection.active(), store, FrameReason::Reset)
    }

    /// Hand a frame to the chart.
    pub fn publish(&self, frame: ChartFrame) {
        tracing::debug!(
            instrument = %frame.instrument,
            points = frame.points.len(),
            reason = frame.reason.as_str(),
            "Publishing chart frame"
        );
        let reason = frame.reason;
        self.chart.publish(frame);
        metrics::record_frame_published(reason);
    }

    fn frame(instrument: &Instrument, store: &SeriesStore, reason: FrameReason) -> ChartFrame {
        ChartFrame {
            instrument: instrument.clone(),
            points: store.view(instrument.as_str()),
            reason,
        }
    }
}

impl std::fmt::Debug for RenderBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderBridge").finish_non_exhaustive()
    }
}
