//! # Health Checking
//!
//! Health checking for identity-plane components, surfaced through the
//! `/health` endpoints.

use crate::storage::DbPool;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status for a component
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase", tag = "status", content = "message")]
pub enum HealthStatus {
    /// Component is healthy and operational
    Healthy,
    /// Component is degraded but still functional
    Degraded(String),
    /// Component is unhealthy and not functional
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    /// Healthy or degraded still counts as operational
    pub fn is_operational(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded(_))
    }
}

/// Health check result for a component
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub component: String,
    #[serde(flatten)]
    pub status: HealthStatus,
    pub last_check: DateTime<Utc>,
}

impl HealthCheck {
    pub fn new(component: impl Into<String>, status: HealthStatus) -> Self {
        Self { component: component.into(), status, last_check: Utc::now() }
    }

    pub fn healthy(component: impl Into<String>) -> Self {
        Self::new(component, HealthStatus::Healthy)
    }

    pub fn unhealthy(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(component, HealthStatus::Unhealthy(message.into()))
    }
}

/// Tracks component health for the readiness endpoint
#[derive(Debug, Clone, Default)]
pub struct HealthChecker {
    components: Arc<RwLock<HashMap<String, HealthCheck>>>,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest check result for a component
    pub async fn record(&self, check: HealthCheck) {
        let mut components = self.components.write().await;
        components.insert(check.component.clone(), check);
    }

    /// Ping the database and record the result
    pub async fn check_database(&self, pool: &DbPool) -> HealthCheck {
        let check = match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
            Ok(_) => HealthCheck::healthy("database"),
            Err(err) => HealthCheck::unhealthy("database", err.to_string()),
        };
        self.record(check.clone()).await;
        check
    }

    /// Snapshot of all recorded component checks
    pub async fn snapshot(&self) -> Vec<HealthCheck> {
        let components = self.components.read().await;
        let mut checks: Vec<_> = components.values().cloned().collect();
        checks.sort_by(|a, b| a.component.cmp(&b.component));
        checks
    }

    /// Overall readiness: every recorded component must be operational
    pub async fn is_ready(&self) -> bool {
        let components = self.components.read().await;
        components.values().all(|check| check.status.is_operational())
    }
}
