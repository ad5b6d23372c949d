//! # Observability Infrastructure
//!
//! Structured logging, metrics collection, and health checking for the
//! keyplane identity plane.

pub mod health;
pub mod metrics;

pub use health::{HealthCheck, HealthChecker, HealthStatus};
pub use metrics::{init_metrics, MetricsRecorder};

use crate::config::ObservabilityConfig;
use crate::errors::{Error, Result};
use ::tracing::info;
use tracing_subscriber::EnvFilter;

/// Initialize structured logging from the observability configuration.
///
/// Safe to call once per process; subsequent calls return an error from the
/// global subscriber registration, which callers may ignore in tests.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| Error::config(format!("Invalid log filter '{}': {}", config.log_level, e)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let result = if config.json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| Error::config(format!("Failed to initialize logging: {}", e)))
}

/// Initialize all observability components, returning the process health checker.
pub async fn init_observability(config: &ObservabilityConfig) -> Result<HealthChecker> {
    init_tracing(config)?;

    if config.enable_metrics {
        init_metrics(config).await?;
    }

    let health_checker = HealthChecker::new();

    info!(
        service_name = %config.service_name,
        log_level = %config.log_level,
        metrics_enabled = %config.enable_metrics,
        "Observability initialized successfully"
    );

    Ok(health_checker)
}
