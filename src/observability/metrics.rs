//! # Metrics Collection
//!
//! Prometheus metrics collection for the identity plane.

use crate::config::ObservabilityConfig;
use crate::errors::{Error, Result};
use ::tracing::{info, warn};
use metrics::{counter, describe_counter, describe_gauge, gauge, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Metrics recorder that tracks authentication and session activity
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Record an authentication attempt outcome (login or bearer verification)
    pub fn record_authentication(&self, status: &str) {
        let labels = [("status", status.to_string())];
        counter!("auth_attempts_total", &labels).increment(1);
    }

    /// Record an access/refresh token pair being issued
    pub fn record_token_issued(&self) {
        counter!("auth_token_pairs_issued_total").increment(1);
    }

    /// Record a successful refresh-token rotation
    pub fn record_token_refreshed(&self) {
        counter!("auth_refresh_rotations_total").increment(1);
    }

    /// Record refresh-token revocations (logout, password change, reuse defence)
    pub fn record_token_revoked(&self, reason: &str) {
        let labels = [("reason", reason.to_string())];
        counter!("auth_refresh_revocations_total", &labels).increment(1);
    }

    /// Record an OTP challenge lifecycle event
    pub fn record_otp_challenge(&self, outcome: &str) {
        let labels = [("outcome", outcome.to_string())];
        counter!("auth_otp_challenges_total", &labels).increment(1);
    }

    /// Update the live refresh-session gauge
    pub fn set_active_sessions(&self, count: usize) {
        gauge!("auth_active_sessions").set(count as f64);
    }

    fn register_auth_metrics(&self) {
        describe_counter!(
            "auth_attempts_total",
            Unit::Count,
            "Authentication attempts by outcome status"
        );
        describe_counter!(
            "auth_token_pairs_issued_total",
            Unit::Count,
            "Access/refresh token pairs issued"
        );
        describe_counter!(
            "auth_refresh_rotations_total",
            Unit::Count,
            "Successful refresh-token rotations"
        );
        describe_counter!(
            "auth_refresh_revocations_total",
            Unit::Count,
            "Refresh tokens revoked, labelled by reason"
        );
        describe_counter!(
            "auth_otp_challenges_total",
            Unit::Count,
            "OTP challenge events by outcome"
        );
        describe_gauge!("auth_active_sessions", Unit::Count, "Live refresh sessions");
    }
}

/// Global metrics recorder instance
static METRICS: once_cell::sync::Lazy<Arc<RwLock<Option<MetricsRecorder>>>> =
    once_cell::sync::Lazy::new(|| Arc::new(RwLock::new(None)));

/// Initialize metrics collection and Prometheus exporter
pub async fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    if !config.enable_metrics {
        return Ok(());
    }

    let metrics_addr = match config.metrics_address.as_ref() {
        Some(addr) => addr.clone(),
        None => {
            warn!("Metrics disabled: no bind address configured");
            return Ok(());
        }
    };

    let socket_addr: SocketAddr = metrics_addr.parse().map_err(|e| {
        Error::config(format!("Invalid metrics bind address '{}': {}", metrics_addr, e))
    })?;

    let builder = PrometheusBuilder::new()
        .with_http_listener(socket_addr)
        .add_global_label("service", &config.service_name);

    builder
        .install()
        .map_err(|e| Error::config(format!("Failed to initialize metrics exporter: {}", e)))?;

    let recorder = MetricsRecorder::new();
    {
        let mut metrics = METRICS.write().await;
        *metrics = Some(recorder.clone());
    }

    recorder.register_auth_metrics();

    info!(
        metrics_addr = %metrics_addr,
        service_name = %config.service_name,
        "Metrics collection initialized"
    );

    Ok(())
}

/// Get the global metrics recorder
pub async fn get_metrics() -> Option<MetricsRecorder> {
    METRICS.read().await.clone()
}

/// Record an authentication attempt outcome via the global recorder
pub async fn record_authentication(status: &str) {
    if let Some(metrics) = get_metrics().await {
        metrics.record_authentication(status);
    }
}

/// Record a token pair being issued via the global recorder
pub async fn record_token_issued() {
    if let Some(metrics) = get_metrics().await {
        metrics.record_token_issued();
    }
}

/// Record a refresh rotation via the global recorder
pub async fn record_token_refreshed() {
    if let Some(metrics) = get_metrics().await {
        metrics.record_token_refreshed();
    }
}

/// Record refresh revocations via the global recorder
pub async fn record_token_revoked(reason: &str) {
    if let Some(metrics) = get_metrics().await {
        metrics.record_token_revoked(reason);
    }
}

/// Record an OTP challenge event via the global recorder
pub async fn record_otp_challenge(outcome: &str) {
    if let Some(metrics) = get_metrics().await {
        metrics.record_otp_challenge(outcome);
    }
}

/// Update the live session gauge via the global recorder
pub async fn set_active_sessions(count: usize) {
    if let Some(metrics) = get_metrics().await {
        metrics.set_active_sessions(count);
    }
}
