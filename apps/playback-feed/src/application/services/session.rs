//! Playback Session
//!
//! Wires the clock driver, series store, selection and render bridge into one
//! unit. Every operation runs under the dispatch gate shared with the driver,
//! so ticks, selection changes, resets and manual ingestion never interleave.
//!
//! # Lock Order
//!
//! Dispatch gate first, then the context mutex. The context mutex is never
//! held while calling into the driver or the chart.

use std::num::NonZeroUsize;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use super::bridge::RenderBridge;
use super::driver::{ClockDriver, DispatchGate, DriverConfig, DriverError, TickPolicy};
use crate::application::ports::{ChartFrame, ChartPort, ObservationSubscriber, TimeSource};
use crate::domain::errors::PlaybackError;
use crate::domain::instrument::{Instrument, InstrumentUniverse};
use crate::domain::selection::SelectionController;
use crate::domain::series::{ApplyOutcome, Observation, Point, SeriesStore};
use crate::infrastructure::metrics;

// =============================================================================
// Playback Context
// =============================================================================

/// Store and selection owned together, with the frame the last operation
/// produced for the chart.
#[derive(Debug)]
pub struct PlaybackContext {
    store: SeriesStore,
    selection: SelectionController,
    pending: Option<ChartFrame>,
    applied: u64,
    rejected: u64,
}

impl PlaybackContext {
    /// Create an empty context.
    #[must_use]
    pub fn new(window: NonZeroUsize, selection: SelectionController) -> Self {
        Self {
            store: SeriesStore::new(window),
            selection,
            pending: None,
            applied: 0,
            rejected: 0,
        }
    }

    /// Apply an observation, queueing a frame if it hit the active instrument.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::InvalidObservation` when the store rejects the
    /// observation; nothing is modified or queued in that case.
    pub fn handle_observation(
        &mut self,
        observation: &Observation,
    ) -> Result<ApplyOutcome, PlaybackError> {
        let outcome = match self.store.apply(observation) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.record_rejection(&e);
                return Err(e);
            }
        };

        self.applied += 1;
        metrics::record_applied(outcome);
        metrics::set_tracked_instruments(self.store.instrument_count());

        self.pending = RenderBridge::applied_frame(observation, &self.selection, &self.store);
        Ok(outcome)
    }

    /// Change the active instrument.
    ///
    /// Queues the new active window when the selection actually changed.
    /// Returns whether it changed.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::UnknownInstrument`; selection is unchanged.
    pub fn select(&mut self, instrument: &str) -> Result<bool, PlaybackError> {
        let changed = self.selection.select(instrument)?;
        if changed {
            metrics::record_selection_change();
            tracing::info!(instrument = %self.selection.active(), "Active instrument changed");
            self.pending = Some(RenderBridge::selection_frame(&self.selection, &self.store));
        }
        Ok(changed)
    }

    /// Drop every series and queue the empty active window.
    pub fn reset(&mut self) {
        let dropped = self.store.instrument_count();
        self.store.clear();
        metrics::record_reset();
        metrics::set_tracked_instruments(0);
        tracing::info!(dropped_instruments = dropped, "Series store reset");
        self.pending = Some(RenderBridge::reset_frame(&self.selection, &self.store));
    }

    /// Count and log a rejected observation.
    fn record_rejection(&mut self, error: &PlaybackError) {
        self.rejected += 1;
        metrics::record_rejected(error);
        tracing::warn!(code = error.code(), error = %error, "Observation rejected");
    }

    /// Take the frame queued by the last operation.
    pub const fn take_frame(&mut self) -> Option<ChartFrame> {
        self.pending.take()
    }

    /// Window of any instrument, oldest first.
    #[must_use]
    pub fn view(&self, instrument: &str) -> Vec<Point> {
        self.store.view(instrument)
    }

    /// Window of the active instrument.
    #[must_use]
    pub fn active_view(&self) -> Vec<Point> {
        self.store.view(self.selection.active().as_str())
    }

    /// The active instrument.
    #[must_use]
    pub const fn active(&self) -> &Instrument {
        self.selection.active()
    }

    /// Read access to the store.
    #[must_use]
    pub const fn store(&self) -> &SeriesStore {
        &self.store
    }
}

/// Context behind its mutex plus the bridge that renders it.
///
/// Callers hold the dispatch gate; frames are published after the context
/// mutex is released, so a chart handler may call back into the session.
struct SharedContext {
    inner: Mutex<PlaybackContext>,
    bridge: RenderBridge,
}

impl SharedContext {
    /// Run `op` on the context, then publish whatever frame it queued.
    fn update<T>(&self, op: impl FnOnce(&mut PlaybackContext) -> T) -> T {
        let (result, frame) = {
            let mut context = self.inner.lock();
            let result = op(&mut context);
            (result, context.take_frame())
        };
        if let Some(frame) = frame {
            self.bridge.publish(frame);
        }
        result
    }

    /// Read the context.
    fn read<T>(&self, op: impl FnOnce(&PlaybackContext) -> T) -> T {
        op(&self.inner.lock())
    }
}

impl ObservationSubscriber for SharedContext {
    fn on_observation(&self, observation: &Observation) {
        // Rejections are logged and counted inside the context
        let _ = self.update(|context| context.handle_observation(observation));
    }
}

// =============================================================================
// Session
// =============================================================================

/// Session settings resolved from configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Instrument active at startup.
    pub initial_instrument: Instrument,
    /// Window size `W`.
    pub window: NonZeroUsize,
    /// Clock driver settings.
    pub driver: DriverConfig,
}

/// Snapshot of session state for the control surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    /// Whether the driver is ticking.
    pub running: bool,
    /// Active instrument.
    pub active: Instrument,
    /// Universe size.
    pub universe_size: usize,
    /// Instruments with a series.
    pub tracked_instruments: usize,
    /// Window size `W`.
    pub window: usize,
    /// Tick period in milliseconds.
    pub tick_period_ms: u64,
    /// Instrument selection policy.
    pub policy: TickPolicy,
    /// Observations applied since startup.
    pub observations_applied: u64,
    /// Observations rejected since startup.
    pub observations_rejected: u64,
    /// Ticks emitted by the driver since startup.
    pub ticks_emitted: u64,
}

/// The playback system as one unit.
///
/// Chart frames are published with the dispatch gate held and session state
/// unlocked, so a chart handler may call any session operation.
///
/// # Example
///
/// ```rust,no_run
/// use std::num::NonZeroUsize;
/// use std::sync::Arc;
/// use playback_feed::application::services::session::{PlaybackSession, SessionConfig};
/// use playback_feed::application::services::driver::DriverConfig;
/// use playback_feed::domain::instrument::InstrumentUniverse;
/// use playback_feed::infrastructure::broadcast::ChartBroadcast;
/// use playback_feed::infrastructure::clock::SystemTimeSource;
///
/// async fn example() {
///     let universe = Arc::new(InstrumentUniverse::generated(100).unwrap());
///     let config = SessionConfig {
///         initial_instrument: universe.first().clone(),
///         window: NonZeroUsize::new(500).unwrap(),
///         driver: DriverConfig::default(),
///     };
///     let chart = Arc::new(ChartBroadcast::new(1024));
///     let session =
///         PlaybackSession::new(universe, config, chart, Arc::new(SystemTimeSource)).unwrap();
///
///     session.start().unwrap();
///     session.select("MSFT2").unwrap();
///     let window = session.active_view();
///     session.stop();
/// }
/// ```
pub struct PlaybackSession {
    context: Arc<SharedContext>,
    driver: ClockDriver,
    universe: Arc<InstrumentUniverse>,
    gate: DispatchGate,
}

impl PlaybackSession {
    /// Assemble a stopped session with an empty store.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::UnknownInstrument` if the initial instrument is
    /// not in the universe.
    pub fn new(
        universe: Arc<InstrumentUniverse>,
        config: SessionConfig,
        chart: Arc<dyn ChartPort>,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self, PlaybackError> {
        let selection =
            SelectionController::new(Arc::clone(&universe), config.initial_instrument.as_str())?;
        let context = Arc::new(SharedContext {
            inner: Mutex::new(PlaybackContext::new(config.window, selection)),
            bridge: RenderBridge::new(chart),
        });

        let gate = DispatchGate::new();
        let driver = ClockDriver::new(config.driver, Arc::clone(&universe), time, gate.clone());
        driver.subscribe(context.clone());

        Ok(Self {
            context,
            driver,
            universe,
            gate,
        })
    }

    /// Start ticking. No-op if already running.
    ///
    /// # Errors
    ///
    /// Returns `DriverError::RuntimeUnavailable` outside a Tokio runtime.
    pub fn start(&self) -> Result<(), DriverError> {
        self.driver.start()
    }

    /// Stop ticking. No-op if stopped; safe from inside a chart handler.
    pub fn stop(&self) {
        self.driver.stop();
    }

    /// Whether the driver is ticking.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.driver.is_running()
    }

    /// Clear every series. The driver keeps its state.
    pub fn reset(&self) {
        let _gate = self.gate.enter();
        self.context.update(PlaybackContext::reset);
    }

    /// Change the active instrument; returns whether it changed.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::UnknownInstrument`; selection is unchanged.
    pub fn select(&self, instrument: &str) -> Result<bool, PlaybackError> {
        let _gate = self.gate.enter();
        self.context.update(|context| context.select(instrument))
    }

    /// The active instrument.
    #[must_use]
    pub fn active(&self) -> Instrument {
        let _gate = self.gate.enter();
        self.context.read(|context| context.active().clone())
    }

    /// Window of any instrument; empty if never observed.
    #[must_use]
    pub fn view(&self, instrument: &str) -> Vec<Point> {
        let _gate = self.gate.enter();
        self.context.read(|context| context.view(instrument))
    }

    /// Window of the active instrument.
    #[must_use]
    pub fn active_view(&self) -> Vec<Point> {
        let _gate = self.gate.enter();
        self.context.read(PlaybackContext::active_view)
    }

    /// Feed an external observation through the same path as a tick.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::UnknownInstrument` for a non-member and
    /// `PlaybackError::InvalidObservation` for a non-finite value.
    pub fn ingest(&self, observation: &Observation) -> Result<ApplyOutcome, PlaybackError> {
        self.ingest_with(observation.instrument.as_str(), |member| {
            Ok(Observation::new(
                member.clone(),
                observation.timestamp,
                observation.value,
            ))
        })
    }

    /// Feed an external sample given as whole seconds.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::UnknownInstrument` for a non-member and
    /// `PlaybackError::InvalidObservation` for a non-finite value.
    pub fn ingest_at(
        &self,
        instrument: &str,
        timestamp: i64,
        value: f64,
    ) -> Result<ApplyOutcome, PlaybackError> {
        self.ingest_with(instrument, |member| {
            Ok(Observation::new(member.clone(), timestamp, value))
        })
    }

    /// Feed an external sample given as fractional seconds.
    ///
    /// Membership is checked first, then the timestamp, then the value.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::UnknownInstrument` for a non-member and
    /// `PlaybackError::InvalidObservation` for a fractional or out-of-range
    /// timestamp or a non-finite value.
    pub fn ingest_secs(
        &self,
        instrument: &str,
        timestamp_secs: f64,
        value: f64,
    ) -> Result<ApplyOutcome, PlaybackError> {
        self.ingest_with(instrument, |member| {
            Observation::from_secs_f64(member.clone(), timestamp_secs, value)
        })
    }

    /// Resolve membership, build the observation and apply it, counting every
    /// rejection.
    fn ingest_with(
        &self,
        instrument: &str,
        build: impl FnOnce(&Instrument) -> Result<Observation, PlaybackError>,
    ) -> Result<ApplyOutcome, PlaybackError> {
        let _gate = self.gate.enter();
        let observation = self.universe.resolve(instrument).and_then(build);

        self.context.update(|context| match observation {
            Ok(observation) => context.handle_observation(&observation),
            Err(e) => {
                context.record_rejection(&e);
                Err(e)
            }
        })
    }

    /// The instrument universe.
    #[must_use]
    pub const fn universe(&self) -> &Arc<InstrumentUniverse> {
        &self.universe
    }

    /// Current status snapshot.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        let _gate = self.gate.enter();
        let running = self.driver.is_running();
        let config = self.driver.config();
        self.context.read(|context| SessionStatus {
            running,
            active: context.active().clone(),
            universe_size: self.universe.len(),
            tracked_instruments: context.store().instrument_count(),
            window: context.store().window().get(),
            tick_period_ms: u64::try_from(config.period.as_millis()).unwrap_or(u64::MAX),
            policy: config.policy,
            observations_applied: context.applied,
            observations_rejected: context.rejected,
            ticks_emitted: self.driver.ticks_emitted(),
        })
    }
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("running", &self.driver.is_running())
            .field("universe_size", &self.universe.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
