//! # Structured Logging Module
//!
//! Environment-aware structured logging for the orchestrator and its CLI.
//! Production emits JSON lines; every other environment emits readable text.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::loader::detect_environment;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// `RUST_LOG` overrides the environment's default level. Safe to call more
/// than once and safe when another subscriber is already installed.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = detect_environment();
        let log_level = get_log_level(&environment);
        let filter =
            || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

        let json = environment == "production";
        let console = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_writer(std::io::stderr);

        let result = if json {
            tracing_subscriber::registry()
                .with(console.json().with_filter(filter()))
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(console.with_ansi(true).with_filter(filter()))
                .try_init()
        };

        if result.is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            json = json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for workflow lifecycle operations
pub fn log_workflow_operation(
    operation: &str,
    slot: &str,
    variant: Option<&str>,
    invocation_id: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        slot = %slot,
        variant = variant,
        invocation_id = invocation_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 WORKFLOW_OPERATION"
    );
}

/// Log structured data for a single job observation
pub fn log_job_operation(
    operation: &str,
    job_id: &str,
    stage: &str,
    state: &str,
    details: Option<&str>,
) {
    tracing::debug!(
        operation = %operation,
        job_id = %job_id,
        stage = %stage,
        state = %state,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🔧 JOB_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("unknown"), "debug");
    }

    #[test]
    fn test_repeated_initialization_is_harmless() {
        init_structured_logging();
        init_structured_logging();
        log_workflow_operation("launch", "extract", Some("extract-only"), None, "ok", None);
    }
}
