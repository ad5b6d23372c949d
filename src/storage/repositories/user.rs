//! User repository for account management and authentication lookups.

use crate::auth::user::{NewUser, UpdateUser, User};
use crate::domain::UserId;
use crate::errors::{Error, Result};
use crate::storage::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::instrument;

#[derive(Debug, Clone, FromRow)]
struct UserRow {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub is_active: bool,
    pub email_verified: bool,
    pub otp_enabled: bool,
    pub login_attempts: i64,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const USER_COLUMNS: &str = "id, email, password_hash, name, is_active, email_verified, otp_enabled, login_attempts, last_login_at, created_at, updated_at";

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create_user(&self, user: NewUser) -> Result<User>;

    /// Get a user by ID
    async fn get_user(&self, id: &UserId) -> Result<Option<User>>;

    /// Get a user by email (case-insensitive)
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Get a user with their password hash for authentication
    async fn get_user_with_password(&self, email: &str) -> Result<Option<(User, String)>>;

    /// Get the stored password hash for a user
    async fn get_password_hash(&self, id: &UserId) -> Result<Option<String>>;

    /// Update a user's details
    async fn update_user(&self, id: &UserId, update: UpdateUser) -> Result<User>;

    /// Update a user's password hash
    async fn update_password(&self, id: &UserId, password_hash: String) -> Result<()>;

    /// Increment the failed login counter
    async fn increment_login_attempts(&self, id: &UserId) -> Result<()>;

    /// Reset the failed-login counter without touching the login timestamp
    async fn reset_login_attempts(&self, id: &UserId) -> Result<()>;

    /// Reset the failed login counter and stamp a successful login
    async fn record_login_success(&self, id: &UserId) -> Result<()>;

    /// List all users (with pagination)
    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>>;

    /// Count total users
    async fn count_users(&self) -> Result<i64>;

    /// Delete a user (cascades role assignments, tokens, and challenges)
    async fn delete_user(&self, id: &UserId) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SqlxUserRepository {
    pool: DbPool,
}

impl SqlxUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn row_to_user(&self, row: UserRow) -> User {
        User {
            id: UserId::from_string(row.id),
            email: row.email,
            name: row.name,
            is_active: row.is_active,
            email_verified: row.email_verified,
            otp_enabled: row.otp_enabled,
            login_attempts: row.login_attempts,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    async fn fetch_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        let normalized = User::normalize_email(email);
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(&normalized)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| Error::Database {
            source: err,
            context: "Failed to fetch user by email".to_string(),
        })
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    #[instrument(skip(self, user), fields(user_email = %user.email, user_id = %user.id), name = "db_create_user")]
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let id = user.id.to_string();
        let email = User::normalize_email(&user.email);

        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, name, is_active, email_verified, otp_enabled, login_attempts, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8, $9)
            "#,
        )
        .bind(&id)
        .bind(&email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(user.is_active)
        .bind(user.email_verified)
        .bind(user.otp_enabled)
        .bind(Utc::now())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Error::conflict(format!("User with email '{}' already exists", email))
            }
            _ => Error::Database { source: err, context: "Failed to create user".to_string() },
        })?;

        self.get_user(&user.id)
            .await?
            .ok_or_else(|| Error::internal("User not found after creation"))
    }

    #[instrument(skip(self), fields(user_id = %id), name = "db_get_user")]
    async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| Error::Database {
            source: err,
            context: "Failed to fetch user".to_string(),
        })?;

        Ok(row.map(|r| self.row_to_user(r)))
    }

    #[instrument(skip(self, email), name = "db_get_user_by_email")]
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = self.fetch_by_email(email).await?;
        Ok(row.map(|r| self.row_to_user(r)))
    }

    #[instrument(skip(self, email), name = "db_get_user_with_password")]
    async fn get_user_with_password(&self, email: &str) -> Result<Option<(User, String)>> {
        match self.fetch_by_email(email).await? {
            Some(row) => {
                let password_hash = row.password_hash.clone();
                Ok(Some((self.row_to_user(row), password_hash)))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(user_id = %id), name = "db_get_password_hash")]
    async fn get_password_hash(&self, id: &UserId) -> Result<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| Error::Database {
                source: err,
                context: "Failed to fetch password hash".to_string(),
            })
    }

    #[instrument(skip(self, update), fields(user_id = %id), name = "db_update_user")]
    async fn update_user(&self, id: &UserId, update: UpdateUser) -> Result<User> {
        let current = self
            .get_user(id)
            .await?
            .ok_or_else(|| Error::not_found("User", id.to_string()))?;

        let email = update.email.map(|e| User::normalize_email(&e)).unwrap_or(current.email);
        let name = update.name.unwrap_or(current.name);
        let is_active = update.is_active.unwrap_or(current.is_active);
        let email_verified = update.email_verified.unwrap_or(current.email_verified);
        let otp_enabled = update.otp_enabled.unwrap_or(current.otp_enabled);

        sqlx::query(
            r#"
            UPDATE users
            SET email = $1, name = $2, is_active = $3, email_verified = $4, otp_enabled = $5, updated_at = $6
            WHERE id = $7
            "#,
        )
        .bind(&email)
        .bind(&name)
        .bind(is_active)
        .bind(email_verified)
        .bind(otp_enabled)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|err| Error::Database {
            source: err,
            context: "Failed to update user".to_string(),
        })?;

        self.get_user(id).await?.ok_or_else(|| Error::internal("User not found after update"))
    }

    #[instrument(skip(self, password_hash), fields(user_id = %id), name = "db_update_password")]
    async fn update_password(&self, id: &UserId, password_hash: String) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3")
            .bind(&password_hash)
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|err| Error::Database {
                source: err,
                context: "Failed to update password".to_string(),
            })?;

        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %id), name = "db_increment_login_attempts")]
    async fn increment_login_attempts(&self, id: &UserId) -> Result<()> {
        sqlx::query(
            "UPDATE users SET login_attempts = login_attempts + 1, updated_at = $1 WHERE id = $2",
        )
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|err| Error::Database {
            source: err,
            context: "Failed to increment login attempts".to_string(),
        })?;

        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %id), name = "db_reset_login_attempts")]
    async fn reset_login_attempts(&self, id: &UserId) -> Result<()> {
        sqlx::query("UPDATE users SET login_attempts = 0, updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|err| Error::Database {
                source: err,
                context: "Failed to reset login attempts".to_string(),
            })?;

        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %id), name = "db_record_login_success")]
    async fn record_login_success(&self, id: &UserId) -> Result<()> {
        sqlx::query(
            "UPDATE users SET login_attempts = 0, last_login_at = $1, updated_at = $1 WHERE id = $2",
        )
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|err| Error::Database {
            source: err,
            context: "Failed to record login success".to_string(),
        })?;

        Ok(())
    }

    #[instrument(skip(self), fields(limit = limit, offset = offset), name = "db_list_users")]
    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>> {
        let limit = limit.clamp(1, 1000);

        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            USER_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| Error::Database {
            source: err,
            context: "Failed to list users".to_string(),
        })?;

        Ok(rows.into_iter().map(|r| self.row_to_user(r)).collect())
    }

    #[instrument(skip(self), name = "db_count_users")]
    async fn count_users(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|err| Error::Database {
                source: err,
                context: "Failed to count users".to_string(),
            })
    }

    #[instrument(skip(self), fields(user_id = %id), name = "db_delete_user")]
    async fn delete_user(&self, id: &UserId) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|err| Error::Database {
                source: err,
                context: "Failed to delete user".to_string(),
            })?;

        Ok(())
    }
}
