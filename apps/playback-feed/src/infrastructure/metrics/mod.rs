//! Prometheus Metrics Module
//!
//! Exposes playback metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Ticks**: observations emitted by the clock driver
//! - **Store**: observations applied, coalesced, rejected and trimmed
//! - **Render**: frames published to the chart port
//! - **Control**: selection changes and the driver running gauge
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the control server port. Recording
//! functions are no-ops until `init_metrics` installs the recorder.
//!
//! The clock driver, render bridge and playback context call the recording
//! functions directly. This is the only outward dependency of the application
//! layer.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::application::ports::FrameReason;
use crate::domain::errors::PlaybackError;
use crate::domain::series::ApplyOutcome;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "playback_ticks_emitted_total",
        "Observations emitted by the clock driver"
    );
    describe_counter!(
        "playback_observations_applied_total",
        "Observations applied to the series store by outcome"
    );
    describe_counter!(
        "playback_observations_rejected_total",
        "Observations rejected by the series store by reason"
    );
    describe_counter!(
        "playback_points_trimmed_total",
        "Points dropped from the front of a window"
    );
    describe_counter!(
        "playback_frames_published_total",
        "Frames published to the chart port by reason"
    );
    describe_counter!(
        "playback_selection_changes_total",
        "Active instrument changes"
    );
    describe_counter!("playback_resets_total", "Full store resets");
    describe_gauge!(
        "playback_driver_running",
        "1 while the clock driver is running"
    );
    describe_gauge!(
        "playback_tracked_instruments",
        "Instruments with a series buffer"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record one observation emitted by the clock driver.
pub fn record_tick_emitted() {
    counter!("playback_ticks_emitted_total").increment(1);
}

/// Record an applied observation.
pub fn record_applied(outcome: ApplyOutcome) {
    counter!(
        "playback_observations_applied_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);

    if let ApplyOutcome::Appended { trimmed } = outcome
        && trimmed > 0
    {
        counter!("playback_points_trimmed_total").increment(trimmed as u64);
    }
}

/// Record a rejected observation.
pub fn record_rejected(error: &PlaybackError) {
    let reason = match error {
        PlaybackError::InvalidObservation { defect, .. } => defect.as_str(),
        PlaybackError::UnknownInstrument(_) => "unknown_instrument",
    };
    counter!(
        "playback_observations_rejected_total",
        "reason" => reason
    )
    .increment(1);
}

/// Record a frame published to the chart.
pub fn record_frame_published(reason: FrameReason) {
    counter!(
        "playback_frames_published_total",
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Record an active instrument change.
pub fn record_selection_change() {
    counter!("playback_selection_changes_total").increment(1);
}

/// Record a store reset.
pub fn record_reset() {
    counter!("playback_resets_total").increment(1);
}

/// Update the driver running gauge.
pub fn set_driver_running(running: bool) {
    gauge!("playback_driver_running").set(if running { 1.0 } else { 0.0 });
}

/// Update the tracked instrument gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_tracked_instruments(count: usize) {
    gauge!("playback_tracked_instruments").set(count as f64);
}

// =============================================================================
// Tests
// =============================================================================
