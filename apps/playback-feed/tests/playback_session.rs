//! Playback Session Integration Tests
//!
//! Drives the assembled session through ticks, selection changes, resets and
//! manual ingestion, observing what reaches the chart.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::num::NonZeroUsize;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use playback_feed::{
    ApplyOutcome, ChartBroadcast, ChartFrame, ChartPort, DriverConfig, FrameReason, Instrument,
    InstrumentUniverse, ManualTimeSource, Observation, PlaybackError, PlaybackSession, Point,
    SessionConfig, TickPolicy, TickProfile,
};

const PERIOD: Duration = Duration::from_millis(200);

#[derive(Default)]
struct RecordingChart {
    frames: Mutex<Vec<ChartFrame>>,
}

impl RecordingChart {
    fn frames(&self) -> Vec<ChartFrame> {
        self.frames.lock().clone()
    }
}

impl ChartPort for RecordingChart {
    fn publish(&self, frame: ChartFrame) {
        self.frames.lock().push(frame);
    }
}

/// Stops the session the first time it renders.
#[derive(Default)]
struct StoppingChart {
    session: Mutex<Weak<PlaybackSession>>,
    frames: Mutex<usize>,
}

impl ChartPort for StoppingChart {
    fn publish(&self, _frame: ChartFrame) {
        *self.frames.lock() += 1;
        if let Some(session) = self.session.lock().upgrade() {
            session.stop();
        }
    }
}

/// Reads session state from inside every render.
#[derive(Default)]
struct InspectingChart {
    session: Mutex<Weak<PlaybackSession>>,
    seen: Mutex<Vec<(Instrument, usize, u64)>>,
}

impl ChartPort for InspectingChart {
    fn publish(&self, _frame: ChartFrame) {
        let Some(session) = self.session.lock().upgrade() else {
            return;
        };
        let entry = (
            session.active(),
            session.active_view().len(),
            session.status().observations_applied,
        );
        self.seen.lock().push(entry);
    }
}

fn config(window: usize, policy: TickPolicy) -> SessionConfig {
    SessionConfig {
        initial_instrument: Instrument::new("AAPL1"),
        window: NonZeroUsize::new(window).unwrap(),
        driver: DriverConfig {
            period: PERIOD,
            policy,
            profile: TickProfile::default(),
        },
    }
}

fn universe() -> Arc<InstrumentUniverse> {
    Arc::new(InstrumentUniverse::new(["AAPL1", "MSFT2", "GOOG3"]).unwrap())
}

fn session(chart: Arc<dyn ChartPort>, clock: Arc<ManualTimeSource>) -> PlaybackSession {
    PlaybackSession::new(universe(), config(3, TickPolicy::RoundRobin), chart, clock).unwrap()
}

fn obs(instrument: &str, timestamp: i64, value: f64) -> Observation {
    Observation::new(Instrument::new(instrument), timestamp, value)
}

#[test]
fn selection_reveals_updates_accumulated_while_inactive() {
    let chart = Arc::new(RecordingChart::default());
    let session = session(chart.clone(), Arc::new(ManualTimeSource::new(0.0)));

    session.ingest(&obs("AAPL1", 1, 10.0)).unwrap();
    for (t, v) in [(1, 20.0), (2, 21.0), (3, 22.0), (4, 23.0)] {
        session.ingest(&obs("MSFT2", t, v)).unwrap();
    }
    // Only the active instrument rendered so far
    assert_eq!(chart.frames().len(), 1);

    session.select("MSFT2").unwrap();
    let frame = chart.frames().pop().unwrap();
    assert_eq!(frame.reason, FrameReason::SelectionChanged);
    assert_eq!(
        frame.points,
        vec![Point::new(2, 21.0), Point::new(3, 22.0), Point::new(4, 23.0)]
    );

    session.select("AAPL1").unwrap();
    assert_eq!(session.active_view(), vec![Point::new(1, 10.0)]);
    assert_eq!(chart.frames().len(), 3);
}

#[test]
fn late_observation_coalesces_into_last_bucket() {
    let session = session(
        Arc::new(RecordingChart::default()),
        Arc::new(ManualTimeSource::new(0.0)),
    );

    session.ingest(&obs("AAPL1", 10, 1.0)).unwrap();
    assert_eq!(
        session.ingest(&obs("AAPL1", 7, 2.0)).unwrap(),
        ApplyOutcome::Coalesced
    );
    assert_eq!(session.view("AAPL1"), vec![Point::new(10, 2.0)]);
}

#[test]
fn rejected_observation_leaves_everything_untouched() {
    let chart = Arc::new(RecordingChart::default());
    let session = session(chart.clone(), Arc::new(ManualTimeSource::new(0.0)));
    session.ingest(&obs("AAPL1", 1, 1.0)).unwrap();

    for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        assert!(matches!(
            session.ingest(&obs("AAPL1", 2, bad)),
            Err(PlaybackError::InvalidObservation { .. })
        ));
    }

    assert_eq!(session.view("AAPL1"), vec![Point::new(1, 1.0)]);
    assert_eq!(chart.frames().len(), 1);
    assert_eq!(session.status().observations_rejected, 3);
}

#[test]
fn reset_empties_every_instrument() {
    let chart = Arc::new(RecordingChart::default());
    let session = session(chart.clone(), Arc::new(ManualTimeSource::new(0.0)));
    session.ingest(&obs("AAPL1", 1, 1.0)).unwrap();
    session.ingest(&obs("GOOG3", 1, 1.0)).unwrap();

    session.reset();

    for name in ["AAPL1", "MSFT2", "GOOG3"] {
        assert!(session.view(name).is_empty());
    }
    assert_eq!(session.status().tracked_instruments, 0);
    let last = chart.frames().pop().unwrap();
    assert_eq!(last.reason, FrameReason::Reset);
    assert!(last.points.is_empty());
}

#[tokio::test(start_paused = true)]
async fn ticks_flow_to_the_chart_for_the_active_instrument() {
    let chart = Arc::new(RecordingChart::default());
    let clock = Arc::new(ManualTimeSource::new(1_000.0));
    let session = session(chart.clone(), clock.clone());

    session.start().unwrap();
    // Round robin: AAPL1, MSFT2, GOOG3, AAPL1, MSFT2, GOOG3
    // Advance the clock halfway between ticks so every tick sees a fresh second
    tokio::time::sleep(PERIOD / 2).await;
    for _ in 0..6 {
        clock.advance(1.0);
        tokio::time::sleep(PERIOD).await;
    }
    session.stop();

    let status = session.status();
    assert_eq!(status.ticks_emitted, 6);
    assert_eq!(status.observations_applied, 6);
    assert_eq!(status.tracked_instruments, 3);

    let frames = chart.frames();
    assert_eq!(frames.len(), 2);
    assert!(frames.iter().all(|f| f.instrument.as_str() == "AAPL1"));
    assert_eq!(frames[1].points.len(), 2);
    assert_eq!(
        frames[1].points.iter().map(|p| p.timestamp).collect::<Vec<_>>(),
        vec![1_001, 1_004]
    );
}

#[tokio::test(start_paused = true)]
async fn window_stays_bounded_under_sustained_ticking() {
    let universe = Arc::new(InstrumentUniverse::new(["SOLO"]).unwrap());
    let clock = Arc::new(ManualTimeSource::new(0.0));
    let mut cfg = config(5, TickPolicy::Random);
    cfg.initial_instrument = Instrument::new("SOLO");
    let session = PlaybackSession::new(
        universe,
        cfg,
        Arc::new(RecordingChart::default()),
        clock.clone(),
    )
    .unwrap();

    session.start().unwrap();
    tokio::time::sleep(PERIOD / 2).await;
    for _ in 0..20 {
        clock.advance(1.0);
        tokio::time::sleep(PERIOD).await;
    }
    session.stop();

    let view = session.active_view();
    assert_eq!(view.len(), 5);
    assert!(view.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    assert_eq!(view.last().unwrap().timestamp, 20);
}

#[tokio::test(start_paused = true)]
async fn stop_from_chart_handler_halts_ticking() {
    let chart = Arc::new(StoppingChart::default());
    let universe = Arc::new(InstrumentUniverse::new(["SOLO"]).unwrap());
    let mut cfg = config(10, TickPolicy::Random);
    cfg.initial_instrument = Instrument::new("SOLO");
    let session = Arc::new(
        PlaybackSession::new(
            universe,
            cfg,
            chart.clone(),
            Arc::new(ManualTimeSource::new(0.0)),
        )
        .unwrap(),
    );
    *chart.session.lock() = Arc::downgrade(&session);

    session.start().unwrap();
    tokio::time::sleep(PERIOD * 10).await;

    assert_eq!(*chart.frames.lock(), 1);
    assert!(!session.is_running());
    assert_eq!(session.status().ticks_emitted, 1);
}

#[tokio::test(start_paused = true)]
async fn chart_handler_may_read_session_state() {
    let chart = Arc::new(InspectingChart::default());
    let clock = Arc::new(ManualTimeSource::new(0.0));
    let session = Arc::new(session(chart.clone(), clock.clone()));
    *chart.session.lock() = Arc::downgrade(&session);

    session.ingest(&obs("AAPL1", 1, 1.0)).unwrap();
    session.select("MSFT2").unwrap();
    session.reset();

    session.start().unwrap();
    tokio::time::sleep(PERIOD / 2).await;
    for _ in 0..3 {
        clock.advance(1.0);
        tokio::time::sleep(PERIOD).await;
    }
    session.stop();

    let seen = chart.seen.lock().clone();
    assert_eq!(
        seen[..3],
        [
            (Instrument::new("AAPL1"), 1, 1),
            (Instrument::new("MSFT2"), 0, 1),
            (Instrument::new("MSFT2"), 0, 1),
        ]
    );
    // Round robin ticks AAPL1, MSFT2, GOOG3; only MSFT2 renders
    assert_eq!(seen.len(), 4);
    assert_eq!(seen[3], (Instrument::new("MSFT2"), 1, 3));
}

#[tokio::test(start_paused = true)]
async fn broadcast_chart_delivers_frames_to_subscribers() {
    let chart = Arc::new(ChartBroadcast::new(16));
    let mut frames = chart.subscribe();
    let session = session(chart.clone(), Arc::new(ManualTimeSource::new(0.0)));

    session.ingest(&obs("AAPL1", 5, 99.0)).unwrap();
    session.select("GOOG3").unwrap();

    let first = frames.recv().await.unwrap();
    assert_eq!(first.reason, FrameReason::Tick);
    assert_eq!(first.points, vec![Point::new(5, 99.0)]);

    let second = frames.recv().await.unwrap();
    assert_eq!(second.reason, FrameReason::SelectionChanged);
    assert_eq!(second.instrument.as_str(), "GOOG3");
    assert!(second.points.is_empty());
}
