//! # Storage and Persistence
//!
//! This module provides database connectivity and the persistence layer for
//! user accounts, roles, refresh tokens, and OTP challenges.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use crate::config::DatabaseConfig;

pub use pool::{create_pool, DbPool};
pub use repositories::{
    AuditEvent, AuditLogRepository, OtpChallengeRepository, PermissionRepository,
    RefreshTokenRepository, RoleRepository, SqlxOtpChallengeRepository,
    SqlxPermissionRepository, SqlxRefreshTokenRepository, SqlxRoleRepository, SqlxUserRepository,
    UserRepository,
};

use crate::errors::{Error, Result};

/// Run database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    migrations::run_migrations(pool).await
}

/// Check database connectivity
pub async fn check_connection(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1").fetch_one(pool).await.map_err(|e| Error::Database {
        source: e,
        context: "Database connectivity check failed".to_string(),
    })?;

    Ok(())
}
