//! Control and Health HTTP Server
//!
//! Operator surface for the playback session plus the usual probes.
//!
//! # Endpoints
//!
//! - `GET /health` - JSON health status with a session snapshot
//! - `GET /healthz` - liveness probe (simple OK)
//! - `GET /readyz` - readiness probe
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /api/instruments` - the universe, in order
//! - `GET /api/playback` - session status
//! - `POST /api/playback/start|stop|reset` - lifecycle control
//! - `GET|PUT /api/selection` - active instrument
//! - `GET /api/series` - active window
//! - `GET /api/series/{instrument}` - any instrument's window
//! - `POST /api/observations` - manual ingestion

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::driver::DriverError;
use crate::application::services::session::{PlaybackSession, SessionStatus};
use crate::domain::errors::PlaybackError;
use crate::domain::instrument::Instrument;
use crate::domain::series::{ApplyOutcome, Point};
use crate::infrastructure::broadcast::SharedChartBroadcast;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Session snapshot.
    pub playback: SessionStatus,
    /// In-process chart frame receivers.
    pub chart_receivers: usize,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// The clock driver is ticking.
    Healthy,
    /// Operational but not ticking.
    Idle,
}

/// A window of one instrument.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesResponse {
    /// Instrument the window belongs to.
    pub instrument: Instrument,
    /// Ordered points, oldest first.
    pub points: Vec<Point>,
}

/// Selection change request.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectRequest {
    /// Instrument to activate.
    pub instrument: String,
}

/// Selection change result.
#[derive(Debug, Clone, Serialize)]
pub struct SelectResponse {
    /// Active instrument after the request.
    pub instrument: Instrument,
    /// Whether the active instrument changed.
    pub changed: bool,
}

/// Manual observation.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservationRequest {
    /// Instrument identifier.
    pub instrument: String,
    /// Timestamp in seconds; must be integer-valued.
    pub time: Number,
    /// Sample value.
    pub value: f64,
}

/// Manual observation result.
#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    /// `appended` or `coalesced`.
    pub outcome: &'static str,
    /// Points dropped from the front of the window.
    pub trimmed: usize,
}

// =============================================================================
// Server State
// =============================================================================

/// Shared state for the control server.
pub struct ControlState {
    version: String,
    started_at: Instant,
    session: Arc<PlaybackSession>,
    chart: SharedChartBroadcast,
}

impl ControlState {
    /// Create new control server state.
    #[must_use]
    pub fn new(version: String, session: Arc<PlaybackSession>, chart: SharedChartBroadcast) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            session,
            chart,
        }
    }
}

// =============================================================================
// Control Server
// =============================================================================

/// Build the control router.
pub fn router(state: Arc<ControlState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/instruments", get(instruments_handler))
        .route("/api/playback", get(status_handler))
        .route("/api/playback/start", post(start_handler))
        .route("/api/playback/stop", post(stop_handler))
        .route("/api/playback/reset", post(reset_handler))
        .route(
            "/api/selection",
            get(selection_handler).put(select_handler),
        )
        .route("/api/series", get(active_series_handler))
        .route("/api/series/{instrument}", get(series_handler))
        .route("/api/observations", post(ingest_handler))
        .with_state(state)
}

/// Control HTTP server.
pub struct ControlServer {
    port: u16,
    state: Arc<ControlState>,
    cancel: CancellationToken,
}

impl ControlServer {
    /// Create a new control server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<ControlState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the control server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ControlServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), ControlServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ControlServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Control server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| ControlServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Control server stopped");
        Ok(())
    }
}

// =============================================================================
// Probe Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<ControlState>>) -> impl IntoResponse {
    let playback = state.session.status();
    let status = if playback.running {
        HealthStatus::Healthy
    } else {
        HealthStatus::Idle
    };

    Json(HealthResponse {
        status,
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        playback,
        chart_receivers: state.chart.receiver_count(),
    })
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler() -> impl IntoResponse {
    // The session is assembled before the server binds
    (StatusCode::OK, "READY")
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            )
        },
    )
}

// =============================================================================
// Playback Handlers
// =============================================================================

async fn instruments_handler(State(state): State<Arc<ControlState>>) -> Json<Vec<Instrument>> {
    Json(state.session.universe().as_slice().to_vec())
}

async fn status_handler(State(state): State<Arc<ControlState>>) -> Json<SessionStatus> {
    Json(state.session.status())
}

async fn start_handler(
    State(state): State<Arc<ControlState>>,
) -> Result<Json<SessionStatus>, ApiError> {
    state.session.start()?;
    Ok(Json(state.session.status()))
}

async fn stop_handler(State(state): State<Arc<ControlState>>) -> Json<SessionStatus> {
    state.session.stop();
    Json(state.session.status())
}

async fn reset_handler(State(state): State<Arc<ControlState>>) -> Json<SessionStatus> {
    state.session.reset();
    Json(state.session.status())
}

async fn selection_handler(State(state): State<Arc<ControlState>>) -> Json<SelectResponse> {
    Json(SelectResponse {
        instrument: state.session.active(),
        changed: false,
    })
}

async fn select_handler(
    State(state): State<Arc<ControlState>>,
    Json(request): Json<SelectRequest>,
) -> Result<Json<SelectResponse>, ApiError> {
    let changed = state.session.select(&request.instrument)?;
    Ok(Json(SelectResponse {
        instrument: state.session.active(),
        changed,
    }))
}

async fn active_series_handler(State(state): State<Arc<ControlState>>) -> Json<SeriesResponse> {
    let instrument = state.session.active();
    let points = state.session.view(instrument.as_str());
    Json(SeriesResponse { instrument, points })
}

async fn series_handler(
    State(state): State<Arc<ControlState>>,
    Path(instrument): Path<String>,
) -> Result<Json<SeriesResponse>, ApiError> {
    let instrument = state.session.universe().resolve(&instrument)?.clone();
    let points = state.session.view(instrument.as_str());
    Ok(Json(SeriesResponse { instrument, points }))
}

async fn ingest_handler(
    State(state): State<Arc<ControlState>>,
    Json(request): Json<ObservationRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    // Integers go through untouched; anything else is checked as seconds
    let outcome = match request.time.as_i64() {
        Some(timestamp) => state
            .session
            .ingest_at(&request.instrument, timestamp, request.value)?,
        None => state.session.ingest_secs(
            &request.instrument,
            request.time.as_f64().unwrap_or(f64::NAN),
            request.value,
        )?,
    };

    let trimmed = match outcome {
        ApplyOutcome::Appended { trimmed } => trimmed,
        ApplyOutcome::Coalesced => 0,
    };
    Ok(Json(IngestResponse {
        outcome: outcome.as_str(),
        trimmed,
    }))
}

// =============================================================================
// Errors
// =============================================================================

/// Handler error mapped onto an HTTP status and a JSON body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Playback rejected the request.
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    /// The driver could not be started.
    #[error(transparent)]
    Driver(#[from] DriverError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::Playback(e) => match e {
                PlaybackError::UnknownInstrument(_) => (StatusCode::NOT_FOUND, e.code()),
                PlaybackError::InvalidObservation { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, e.code())
                }
            },
            Self::Driver(DriverError::RuntimeUnavailable) => {
                (StatusCode::SERVICE_UNAVAILABLE, "RUNTIME_UNAVAILABLE")
            }
        };

        let body = ErrorBody {
            error: code,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Control server errors.
#[derive(Debug, thiserror::Error)]
pub enum ControlServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
