//! Refresh token repository.
//!
//! Rotation correctness depends on `revoke_if_active`: revoking the presented
//! token is a compare-and-swap so that two concurrent refresh calls with the
//! same token produce exactly one winner.

use crate::auth::models::{NewRefreshToken, RefreshTokenRecord};
use crate::domain::{SessionId, UserId};
use crate::errors::{Error, Result};
use crate::storage::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::instrument;

#[derive(Debug, Clone, FromRow)]
struct RefreshTokenRow {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    pub token_hash: String,
    pub admin_scope: bool,
    pub revoked: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<RefreshTokenRow> for RefreshTokenRecord {
    fn from(row: RefreshTokenRow) -> Self {
        RefreshTokenRecord {
            id: row.id,
            session_id: SessionId::from_string(row.session_id),
            user_id: UserId::from_string(row.user_id),
            token_hash: row.token_hash,
            admin_scope: row.admin_scope,
            revoked: row.revoked,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// Persist a new refresh token record
    async fn create(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord>;

    /// Look up a record by its id, revoked or not
    async fn get(&self, id: &str) -> Result<Option<RefreshTokenRecord>>;

    /// Atomically revoke the record if it is still live. Returns true when
    /// this call performed the revocation, false when the record was already
    /// revoked or absent (the concurrent loser).
    async fn revoke_if_active(&self, id: &str) -> Result<bool>;

    /// Revoke a record unconditionally; idempotent
    async fn revoke(&self, id: &str) -> Result<()>;

    /// Revoke every live record in a rotation chain
    async fn revoke_session(&self, session_id: &SessionId) -> Result<u64>;

    /// Revoke every live record belonging to a user; idempotent
    async fn revoke_all_for_user(&self, user_id: &UserId) -> Result<u64>;

    /// Count live, unexpired records for the active-session gauge
    async fn count_active(&self) -> Result<i64>;
}

#[derive(Debug, Clone)]
pub struct SqlxRefreshTokenRepository {
    pool: DbPool,
}

impl SqlxRefreshTokenRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenRepository for SqlxRefreshTokenRepository {
    #[instrument(skip(self, token), fields(user_id = %token.user_id, session_id = %token.session_id), name = "db_create_refresh_token")]
    async fn create(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, session_id, user_id, token_hash, admin_scope, revoked, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, 0, $6, $7)
            "#,
        )
        .bind(&token.id)
        .bind(token.session_id.as_str())
        .bind(token.user_id.as_str())
        .bind(&token.token_hash)
        .bind(token.admin_scope)
        .bind(token.expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|err| Error::Database {
            source: err,
            context: "Failed to create refresh token".to_string(),
        })?;

        self.get(&token.id)
            .await?
            .ok_or_else(|| Error::internal("Refresh token not found after creation"))
    }

    #[instrument(skip(self, id), name = "db_get_refresh_token")]
    async fn get(&self, id: &str) -> Result<Option<RefreshTokenRecord>> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            "SELECT id, session_id, user_id, token_hash, admin_scope, revoked, expires_at, created_at FROM refresh_tokens WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| Error::Database {
            source: err,
            context: "Failed to fetch refresh token".to_string(),
        })?;

        Ok(row.map(RefreshTokenRecord::from))
    }

    #[instrument(skip(self, id), name = "db_revoke_refresh_token_if_active")]
    async fn revoke_if_active(&self, id: &str) -> Result<bool> {
        let result =
            sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE id = $1 AND revoked = 0")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|err| Error::Database {
                    source: err,
                    context: "Failed to revoke refresh token".to_string(),
                })?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self, id), name = "db_revoke_refresh_token")]
    async fn revoke(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|err| Error::Database {
                source: err,
                context: "Failed to revoke refresh token".to_string(),
            })?;

        Ok(())
    }

    #[instrument(skip(self), fields(session_id = %session_id), name = "db_revoke_session")]
    async fn revoke_session(&self, session_id: &SessionId) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = 1 WHERE session_id = $1 AND revoked = 0",
        )
        .bind(session_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|err| Error::Database {
            source: err,
            context: "Failed to revoke session chain".to_string(),
        })?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(user_id = %user_id), name = "db_revoke_all_for_user")]
    async fn revoke_all_for_user(&self, user_id: &UserId) -> Result<u64> {
        let result =
            sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE user_id = $1 AND revoked = 0")
                .bind(user_id.as_str())
                .execute(&self.pool)
                .await
                .map_err(|err| Error::Database {
                    source: err,
                    context: "Failed to revoke user sessions".to_string(),
                })?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self), name = "db_count_active_refresh_tokens")]
    async fn count_active(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM refresh_tokens WHERE revoked = 0 AND expires_at > $1",
        )
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| Error::Database {
            source: err,
            context: "Failed to count active refresh tokens".to_string(),
        })
    }
}
