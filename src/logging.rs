//! # Structured Logging Module
//!
//! Environment-aware structured logging for the bulk dispatch and timer
//! engines. Console output is human readable by default and switches to
//! JSON lines when requested through [`TelemetryConfig`].

use crate::config::TelemetryConfig;
use chrono::Utc;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    init_logging_with(&TelemetryConfig::default());
}

/// Initialize structured logging, honouring an explicit level and format.
///
/// Only the first call installs a subscriber; later calls are no-ops.
pub fn init_logging_with(telemetry: &TelemetryConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = telemetry
            .log_level
            .clone()
            .unwrap_or_else(|| get_log_level(&environment));
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

        let console = if telemetry.json_logs {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // Embedding hosts may already own the global subscriber
        if tracing_subscriber::registry().with(console).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            log_level = %log_level,
            json = telemetry.json_logs,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("SIDECAR_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for bulk subscribe operations
pub fn log_bulk_operation(
    operation: &str,
    pubsub: &str,
    topic: &str,
    entries: usize,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        pubsub = %pubsub,
        topic = %topic,
        entries = entries,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📦 BULK_OPERATION"
    );
}

/// Log structured data for actor timer operations
pub fn log_timer_operation(
    operation: &str,
    actor_type: &str,
    actor_id: &str,
    timer_name: &str,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        actor_type = %actor_type,
        actor_id = %actor_id,
        timer_name = %timer_name,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "⏰ TIMER_OPERATION"
    );
}
