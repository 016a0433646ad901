//! Clock Driver
//!
//! Cancellable periodic scheduler: while running, each period it picks one
//! instrument from the universe, asks the tick generator for an observation
//! and fans it out synchronously to every subscriber.
//!
//! # State Machine
//!
//! ```text
//!            start()                 stop()
//! Stopped ───────────► Running ───────────► Stopped
//!    ▲  start() while Running: no-op   │
//!    └──── stop() while Stopped: no-op ┘
//! ```
//!
//! # Cancellation
//!
//! Each run owns a `CancellationToken`. The tick task checks the token under
//! the dispatch gate right before emitting, and `stop()` cancels it under the
//! same gate, so once `stop()` returns no further emission can start. The gate
//! is re-entrant, which lets a subscriber call `stop()` from inside
//! `on_observation`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard, RwLock};
use rand::Rng;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{ObservationSubscriber, TimeSource};
use crate::domain::instrument::{Instrument, InstrumentUniverse};
use crate::domain::tick::{TickGenerator, TickProfile};
use crate::infrastructure::metrics;

// =============================================================================
// Dispatch Gate
// =============================================================================

/// Re-entrant lock that serializes every playback event.
///
/// Shared by the clock driver and the session so ticks, selection changes
/// and resets run one at a time, as a single logical thread.
#[derive(Clone, Default)]
pub struct DispatchGate(Arc<ReentrantMutex<()>>);

impl DispatchGate {
    /// Create a new gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the gate; re-entry from the same thread does not block.
    #[must_use]
    pub fn enter(&self) -> ReentrantMutexGuard<'_, ()> {
        self.0.lock()
    }
}

impl std::fmt::Debug for DispatchGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchGate").finish_non_exhaustive()
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// How the driver picks the instrument for each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TickPolicy {
    /// Uniformly random member each period.
    #[default]
    Random,
    /// Members in universe order, wrapping around.
    RoundRobin,
}

impl TickPolicy {
    /// Parse a policy from string; unknown values fall back to `Random`.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_lowercase().replace('_', "-").as_str() {
            "round-robin" | "roundrobin" => Self::RoundRobin,
            _ => Self::Random,
        }
    }

    /// Policy name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::RoundRobin => "round-robin",
        }
    }
}

/// Configuration for the clock driver.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Tick period `P`.
    pub period: Duration,
    /// Instrument selection policy.
    pub policy: TickPolicy,
    /// Waveform of generated ticks.
    pub profile: TickProfile,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(500),
            policy: TickPolicy::Random,
            profile: TickProfile::default(),
        }
    }
}

/// Driver lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverState {
    /// No tick cycle is scheduled.
    Stopped,
    /// A tick cycle is scheduled.
    Running,
}

/// Error type for driver operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    /// `start()` was called outside a Tokio runtime.
    #[error("no tokio runtime available to drive the tick cycle")]
    RuntimeUnavailable,
}

// =============================================================================
// Clock Driver
// =============================================================================

struct DriverShared {
    config: DriverConfig,
    universe: Arc<InstrumentUniverse>,
    generator: TickGenerator,
    time: Arc<dyn TimeSource>,
    gate: DispatchGate,
    subscribers: RwLock<Vec<Arc<dyn ObservationSubscriber>>>,
    cursor: AtomicUsize,
    ticks_emitted: AtomicU64,
}

struct ActiveRun {
    cancel: CancellationToken,
    cycle: u64,
}

/// Periodic tick scheduler.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use playback_feed::application::services::driver::{ClockDriver, DispatchGate, DriverConfig};
/// use playback_feed::domain::instrument::InstrumentUniverse;
/// use playback_feed::infrastructure::clock::SystemTimeSource;
///
/// async fn example() {
///     let universe = Arc::new(InstrumentUniverse::generated(100).unwrap());
///     let driver = ClockDriver::new(
///         DriverConfig::default(),
///         universe,
///         Arc::new(SystemTimeSource),
///         DispatchGate::new(),
///     );
///
///     driver.start().unwrap();
///     driver.start().unwrap(); // no second cycle
///     driver.stop();
/// }
/// ```
pub struct ClockDriver {
    shared: Arc<DriverShared>,
    run: Mutex<Option<ActiveRun>>,
    cycles: AtomicU64,
}

impl ClockDriver {
    /// Create a stopped driver.
    #[must_use]
    pub fn new(
        config: DriverConfig,
        universe: Arc<InstrumentUniverse>,
        time: Arc<dyn TimeSource>,
        gate: DispatchGate,
    ) -> Self {
        let generator = TickGenerator::new(config.profile);
        Self {
            shared: Arc::new(DriverShared {
                config,
                universe,
                generator,
                time,
                gate,
                subscribers: RwLock::new(Vec::new()),
                cursor: AtomicUsize::new(0),
                ticks_emitted: AtomicU64::new(0),
            }),
            run: Mutex::new(None),
            cycles: AtomicU64::new(0),
        }
    }

    /// Register a subscriber; it receives every later emission.
    pub fn subscribe(&self, subscriber: Arc<dyn ObservationSubscriber>) {
        self.shared.subscribers.write().push(subscriber);
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.read().len()
    }

    /// Begin the periodic cycle. No-op if already running.
    ///
    /// The first tick fires one full period after this call.
    ///
    /// # Errors
    ///
    /// Returns `DriverError::RuntimeUnavailable` when called outside a Tokio
    /// runtime; the driver stays stopped.
    pub fn start(&self) -> Result<(), DriverError> {
        let _gate = self.shared.gate.enter();
        let mut run = self.run.lock();

        if let Some(active) = run.as_ref() {
            tracing::debug!(cycle = active.cycle, "Clock driver already running");
            return Ok(());
        }

        let handle =
            tokio::runtime::Handle::try_current().map_err(|_| DriverError::RuntimeUnavailable)?;

        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancellationToken::new();
        handle.spawn(run_cycle(Arc::clone(&self.shared), cancel.clone(), cycle));
        *run = Some(ActiveRun { cancel, cycle });

        metrics::set_driver_running(true);
        tracing::info!(
            cycle,
            period_ms = self.shared.config.period.as_millis(),
            policy = self.shared.config.policy.as_str(),
            instruments = self.shared.universe.len(),
            "Clock driver started"
        );
        Ok(())
    }

    /// Cancel the periodic cycle. No-op if already stopped.
    ///
    /// Safe to call from inside a subscriber. No emission starts after this
    /// returns.
    pub fn stop(&self) {
        let _gate = self.shared.gate.enter();
        let Some(active) = self.run.lock().take() else {
            return;
        };

        active.cancel.cancel();
        metrics::set_driver_running(false);
        tracing::info!(cycle = active.cycle, "Clock driver stopped");
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> DriverState {
        if self.run.lock().is_some() {
            DriverState::Running
        } else {
            DriverState::Stopped
        }
    }

    /// Whether a cycle is scheduled.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == DriverState::Running
    }

    /// Total observations emitted since creation.
    #[must_use]
    pub fn ticks_emitted(&self) -> u64 {
        self.shared.ticks_emitted.load(Ordering::Relaxed)
    }

    /// Driver configuration.
    #[must_use]
    pub fn config(&self) -> &DriverConfig {
        &self.shared.config
    }
}

impl Drop for ClockDriver {
    fn drop(&mut self) {
        if let Some(active) = self.run.get_mut().take() {
            active.cancel.cancel();
        }
    }
}

impl DriverShared {
    /// Emit one tick unless the run was cancelled.
    ///
    /// Returns `false` when the cycle should end.
    fn dispatch(&self, cancel: &CancellationToken) -> bool {
        let _gate = self.gate.enter();
        if cancel.is_cancelled() {
            return false;
        }

        let instrument = self.next_instrument();
        let observation = self.generator.generate(instrument, self.time.now_secs());
        self.ticks_emitted.fetch_add(1, Ordering::Relaxed);
        metrics::record_tick_emitted();

        tracing::trace!(
            instrument = %observation.instrument,
            timestamp = observation.timestamp,
            value = observation.value,
            "Tick emitted"
        );

        // Snapshot so a subscriber may register others without deadlocking
        let subscribers = self.subscribers.read().clone();
        for subscriber in &subscribers {
            subscriber.on_observation(&observation);
        }

        true
    }

    fn next_instrument(&self) -> &Instrument {
        let len = self.universe.len();
        let position = match self.config.policy {
            TickPolicy::Random => rand::rng().random_range(0..len),
            TickPolicy::RoundRobin => self.cursor.fetch_add(1, Ordering::Relaxed) % len,
        };
        self.universe.get(position).unwrap_or_else(|| self.universe.first())
    }
}

async fn run_cycle(shared: Arc<DriverShared>, cancel: CancellationToken, cycle: u64) {
    let period = shared.config.period;
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if !shared.dispatch(&cancel) {
                    break;
                }
            }
        }
    }

    tracing::debug!(cycle, "Tick cycle finished");
}

// =============================================================================
// Tests
// =============================================================================
