//! Audit log repository for authentication lifecycle events.

use crate::errors::{Error, Result};
use crate::storage::DbPool;

/// Audit event descriptor for authentication activity logging.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub action: String,
    pub resource_id: Option<String>,
    pub resource_name: Option<String>,
    pub user_id: Option<String>,
    pub metadata: serde_json::Value,
}

impl AuditEvent {
    pub fn auth(
        action: &str,
        resource_id: Option<&str>,
        resource_name: Option<&str>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            action: action.to_string(),
            resource_id: resource_id.map(|value| value.to_string()),
            resource_name: resource_name.map(|value| value.to_string()),
            user_id: None,
            metadata,
        }
    }

    pub fn with_user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }
}

/// Repository for audit log interactions.
#[derive(Debug, Clone)]
pub struct AuditLogRepository {
    pool: DbPool,
}

impl AuditLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn record_event(&self, resource_type: &str, event: AuditEvent) -> Result<()> {
        let now = chrono::Utc::now();
        let metadata_json = serde_json::to_string(&event.metadata)
            .map_err(|err| Error::validation(format!("Invalid audit metadata JSON: {}", err)))?;
        let resource_name = event.resource_name.unwrap_or_else(|| event.action.clone());

        sqlx::query(
            "INSERT INTO audit_log (resource_type, resource_id, resource_name, action, metadata, user_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(resource_type)
        .bind(event.resource_id.as_deref())
        .bind(&resource_name)
        .bind(event.action.as_str())
        .bind(metadata_json)
        .bind(event.user_id.as_deref())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|err| Error::Database {
            source: err,
            context: "Failed to write audit event".to_string(),
        })?;

        Ok(())
    }

    /// Record an authentication lifecycle event (login, refresh, logout, OTP).
    pub async fn record_auth_event(&self, event: AuditEvent) -> Result<()> {
        self.record_event("auth.session", event).await
    }

    /// Record an account management event (user, role, permission changes).
    pub async fn record_account_event(&self, event: AuditEvent) -> Result<()> {
        self.record_event("account", event).await
    }
}
