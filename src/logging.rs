//! # Structured Logging Module
//!
//! Environment-aware `tracing` setup. Safe to call more than once and safe
//! to call when the host application already installed a subscriber.

use crate::config::{LogFormat, TenantQueryConfig};
use crate::query_builder::Statement;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging using the global configuration
pub fn init_structured_logging() {
    init_with_config(TenantQueryConfig::global());
}

/// Initialize structured logging with an explicit configuration
pub fn init_with_config(config: &TenantQueryConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = || {
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_log_level(&environment)))
        };

        let layer = match config.log_format {
            LogFormat::Json => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .json()
                .with_filter(filter())
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .with_filter(filter())
                .boxed(),
        };

        // Host applications may already own the global subscriber
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized");
        }

        tracing::info!(
            environment = %environment,
            format = ?config.log_format,
            "Structured logging initialized"
        );
    });
}

/// Get current environment from environment variables
pub fn get_environment() -> String {
    std::env::var("TENANT_QUERY_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
pub fn default_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Trace a compiled statement before it is handed to the driver
pub fn log_statement(operation: &str, entity: Option<&str>, statement: &Statement) {
    tracing::debug!(
        operation = %operation,
        entity = entity,
        sql = %statement.sql,
        bindings = statement.bindings.len(),
        "SQL_STATEMENT"
    );
}
