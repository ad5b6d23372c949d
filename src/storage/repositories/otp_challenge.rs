//! OTP challenge repository.
//!
//! At most one active challenge per user; replacing a challenge overwrites the
//! prior row. The attempt counter increments atomically in the database so
//! concurrent verify calls cannot exceed the configured maximum.

use crate::auth::models::{NewOtpChallenge, OtpChallenge};
use crate::domain::UserId;
use crate::errors::{Error, Result};
use crate::storage::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::instrument;

#[derive(Debug, Clone, FromRow)]
struct OtpChallengeRow {
    pub user_id: String,
    pub code_hash: String,
    pub attempts: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<OtpChallengeRow> for OtpChallenge {
    fn from(row: OtpChallengeRow) -> Self {
        OtpChallenge {
            user_id: UserId::from_string(row.user_id),
            code_hash: row.code_hash,
            attempts: row.attempts,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
pub trait OtpChallengeRepository: Send + Sync {
    /// Create a challenge for a user, discarding any prior one
    async fn replace(&self, challenge: NewOtpChallenge) -> Result<()>;

    /// Get the active challenge for a user, if any
    async fn get(&self, user_id: &UserId) -> Result<Option<OtpChallenge>>;

    /// Delete the challenge for a user; idempotent
    async fn delete(&self, user_id: &UserId) -> Result<()>;

    /// Atomically increment the attempt counter, returning the new value.
    /// Returns None when no challenge exists.
    async fn increment_attempts(&self, user_id: &UserId) -> Result<Option<i64>>;
}

#[derive(Debug, Clone)]
pub struct SqlxOtpChallengeRepository {
    pool: DbPool,
}

impl SqlxOtpChallengeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OtpChallengeRepository for SqlxOtpChallengeRepository {
    #[instrument(skip(self, challenge), fields(user_id = %challenge.user_id), name = "db_replace_otp_challenge")]
    async fn replace(&self, challenge: NewOtpChallenge) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO otp_challenges (user_id, code_hash, attempts, expires_at, created_at)
            VALUES ($1, $2, 0, $3, $4)
            ON CONFLICT(user_id) DO UPDATE SET
                code_hash = excluded.code_hash,
                attempts = 0,
                expires_at = excluded.expires_at,
                created_at = excluded.created_at
            "#,
        )
        .bind(challenge.user_id.as_str())
        .bind(&challenge.code_hash)
        .bind(challenge.expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|err| Error::Database {
            source: err,
            context: "Failed to store OTP challenge".to_string(),
        })?;

        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id), name = "db_get_otp_challenge")]
    async fn get(&self, user_id: &UserId) -> Result<Option<OtpChallenge>> {
        let row = sqlx::query_as::<_, OtpChallengeRow>(
            "SELECT user_id, code_hash, attempts, expires_at, created_at FROM otp_challenges WHERE user_id = $1",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| Error::Database {
            source: err,
            context: "Failed to fetch OTP challenge".to_string(),
        })?;

        Ok(row.map(OtpChallenge::from))
    }

    #[instrument(skip(self), fields(user_id = %user_id), name = "db_delete_otp_challenge")]
    async fn delete(&self, user_id: &UserId) -> Result<()> {
        sqlx::query("DELETE FROM otp_challenges WHERE user_id = $1")
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|err| Error::Database {
                source: err,
                context: "Failed to delete OTP challenge".to_string(),
            })?;

        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id), name = "db_increment_otp_attempts")]
    async fn increment_attempts(&self, user_id: &UserId) -> Result<Option<i64>> {
        let attempts = sqlx::query_scalar::<_, i64>(
            "UPDATE otp_challenges SET attempts = attempts + 1 WHERE user_id = $1 RETURNING attempts",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| Error::Database {
            source: err,
            context: "Failed to increment OTP attempts".to_string(),
        })?;

        Ok(attempts)
    }
}
