//! # Structured Logging Module
//!
//! Environment-aware structured logging for the ingestion consumer and the
//! order service. Console output by default, JSON lines when
//! `ORDER_STREAM_LOG_FORMAT=json`.

use chrono::Utc;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let layer = if use_json_output() {
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
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // A subscriber may already be installed by an embedding application
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized");
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            "Structured logging initialized"
        );
    });
}

fn get_environment() -> String {
    std::env::var("ORDER_STREAM_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

fn use_json_output() -> bool {
    std::env::var("ORDER_STREAM_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Log structured data for order service operations
pub fn log_order_operation(
    operation: &str,
    order_uid: Option<&str>,
    status: &str,
    duration_ms: Option<u64>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        order_uid = order_uid,
        status = %status,
        duration_ms = duration_ms,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "ORDER_OPERATION"
    );
}

/// Log structured data for consumer lifecycle and per-message events
pub fn log_consumer_event(
    event: &str,
    topic: &str,
    message_id: Option<&str>,
    attempt: Option<u32>,
    details: Option<&str>,
) {
    tracing::info!(
        event = %event,
        topic = %topic,
        message_id = message_id,
        attempt = attempt,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "CONSUMER_EVENT"
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
        "ERROR"
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
    fn test_init_is_idempotent() {
        init_structured_logging();
        init_structured_logging();
        log_order_operation("process_order", Some("order0001"), "ok", Some(3), None);
        log_consumer_event("poll", "orders", None, None, Some("idle"));
        log_error("consumer", "dead_letter", "sink closed", None);
    }
}
