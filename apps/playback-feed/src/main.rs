//! Playback Feed Binary
//!
//! Starts the simulated price feed and its control server.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin playback-feed
//! ```
//!
//! # Environment Variables
//!
//! - `PLAYBACK_INSTRUMENTS`: Comma-separated universe (default: generated)
//! - `PLAYBACK_UNIVERSE_SIZE`: Generated universe size (default: 100)
//! - `PLAYBACK_INITIAL_INSTRUMENT`: Active at startup (default: first member)
//! - `PLAYBACK_TICK_PERIOD_MS`: Tick period (default: 500)
//! - `PLAYBACK_WINDOW_SIZE`: Points kept per instrument (default: 500)
//! - `PLAYBACK_TICK_POLICY`: random | round-robin (default: random)
//! - `PLAYBACK_HTTP_PORT`: Control server port (default: 8083)
//! - `PLAYBACK_AUTOSTART`: Start ticking on boot (default: false)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use playback_feed::infrastructure::broadcast::ChartBroadcast;
use playback_feed::infrastructure::http::{ControlServer, ControlState};
use playback_feed::infrastructure::telemetry;
use playback_feed::{PlaybackConfig, PlaybackSession, SystemTimeSource, init_metrics};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Playback Feed");

    let _metrics_handle = init_metrics();

    let config = PlaybackConfig::from_env();
    log_config(&config);
    let (universe, session_config) = config.resolve().context("invalid playback configuration")?;

    let shutdown_token = CancellationToken::new();

    let chart = Arc::new(ChartBroadcast::from_settings(&config.broadcast));
    spawn_frame_logger(&chart, shutdown_token.clone());

    let session = Arc::new(PlaybackSession::new(
        Arc::new(universe),
        session_config,
        chart.clone(),
        Arc::new(SystemTimeSource),
    )?);

    if config.autostart {
        session.start()?;
    }

    let control_state = Arc::new(ControlState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&session),
        Arc::clone(&chart),
    ));
    let control_server = ControlServer::new(
        config.server.http_port,
        control_state,
        shutdown_token.clone(),
    );

    let server_task = tokio::spawn(async move {
        if let Err(e) = control_server.run().await {
            tracing::error!(error = %e, "Control server error");
        }
    });

    tracing::info!(active = %session.active(), "Playback feed ready");

    await_shutdown(shutdown_token).await;
    session.stop();

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, server_task).await.is_err() {
        tracing::warn!("Control server did not stop in time");
    }

    tracing::info!("Playback feed stopped");
    Ok(())
}

/// Log every chart frame at debug level until shutdown.
fn spawn_frame_logger(chart: &ChartBroadcast, cancel: CancellationToken) {
    let mut frames = chart.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                frame = frames.recv() => match frame {
                    Ok(frame) => {
                        tracing::debug!(
                            instrument = %frame.instrument,
                            points = frame.points.len(),
                            reason = frame.reason.as_str(),
                            last = ?frame.points.last(),
                            "Chart frame"
                        );
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Frame logger lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    });
}

/// Log the parsed configuration.
fn log_config(config: &PlaybackConfig) {
    tracing::info!(
        universe = config
            .feed
            .instruments
            .as_ref()
            .map_or(config.feed.universe_size, Vec::len),
        tick_period_ms = config.feed.tick_period.as_millis(),
        window = config.feed.window_size,
        policy = config.feed.policy.as_str(),
        http_port = config.server.http_port,
        autostart = config.autostart,
        "Configuration loaded"
    );
    tracing::debug!(tick_profile = ?config.tick, "Tick waveform");
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
