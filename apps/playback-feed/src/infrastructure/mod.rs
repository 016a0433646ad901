//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Broadcast channel adapter for chart frames.
pub mod broadcast;

/// Wall-clock and manual time sources.
pub mod clock;

/// Configuration loading and validation.
pub mod config;

/// Control, health and metrics HTTP server.
pub mod http;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Logging and OpenTelemetry tracing integration.
pub mod telemetry;
