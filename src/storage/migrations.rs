//! # Database Migration Management
//!
//! Schema evolution via SQL files loaded from the `migrations/` directory and
//! executed automatically on startup when auto_migrate is enabled. Applied
//! versions and content checksums are tracked in `_keyplane_migrations`.

use std::path::PathBuf;

use sha2::{Digest, Sha256};
use sqlx::Row;
use tracing::{error, info};

use crate::errors::{Error, Result};
use crate::storage::DbPool;

/// A migration file pending application, parsed from `migrations/`.
#[derive(Debug)]
struct Migration {
    version: i64,
    name: String,
    sql: String,
}

impl Migration {
    /// Parse a migration from a filename of the form `<version>_<name>.sql`.
    fn parse(filename: &str, sql: String) -> Result<Self> {
        let version = filename
            .split('_')
            .next()
            .and_then(|v| v.parse::<i64>().ok())
            .ok_or_else(|| {
                Error::validation(format!("Invalid migration filename: {}", filename))
            })?;

        Ok(Self { version, name: filename.to_string(), sql })
    }

    fn checksum(&self) -> Vec<u8> {
        Sha256::digest(self.sql.as_bytes()).to_vec()
    }
}

/// Locate the migrations directory, preferring the working directory and
/// falling back to the executable's directory for packaged deployments.
fn migrations_dir() -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let dir = cwd.join("migrations");
    if dir.exists() {
        return dir;
    }

    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("migrations")
}

/// Load all migration files, sorted by version.
fn load_migrations() -> Result<Vec<Migration>> {
    let dir = migrations_dir();
    let entries = std::fs::read_dir(&dir).map_err(|e| {
        Error::validation(format!("Failed to read migrations directory {}: {}", dir.display(), e))
    })?;

    let mut migrations = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| Error::validation(format!("Failed to read migration entry: {}", e)))?
            .path();
        if path.extension().and_then(|s| s.to_str()) != Some("sql") {
            continue;
        }

        let filename = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
            Error::validation(format!("Invalid migration filename: {}", path.display()))
        })?;
        let sql = std::fs::read_to_string(&path).map_err(|e| {
            Error::validation(format!("Failed to read migration {}: {}", path.display(), e))
        })?;

        migrations.push(Migration::parse(filename, sql)?);
    }

    if migrations.is_empty() {
        return Err(Error::validation(format!("No migration files found in {}", dir.display())));
    }

    migrations.sort_by_key(|m| m.version);
    Ok(migrations)
}

/// Run all pending database migrations. Each migration executes inside its own
/// transaction together with its tracking row, so a failure leaves the schema
/// at the previous version.
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _keyplane_migrations (
            version BIGINT PRIMARY KEY,
            description TEXT NOT NULL,
            checksum BLOB NOT NULL,
            execution_time BIGINT NOT NULL,
            installed_on TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| Error::database(e, "Failed to create migration tracking table".to_string()))?;

    let applied: Vec<i64> = sqlx::query("SELECT version FROM _keyplane_migrations")
        .fetch_all(pool)
        .await
        .map_err(|e| Error::database(e, "Failed to read applied migrations".to_string()))?
        .into_iter()
        .map(|row| row.get::<i64, _>("version"))
        .collect();

    let mut migrations_run = 0;
    for migration in load_migrations()? {
        if applied.contains(&migration.version) {
            continue;
        }

        info!(version = migration.version, "Running migration: {}", migration.name);
        let started = std::time::Instant::now();

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| Error::database(e, "Failed to start migration transaction".to_string()))?;

        // raw_sql supports multi-statement migration files
        sqlx::raw_sql(&migration.sql).execute(&mut *tx).await.map_err(|e| {
            error!(error = %e, migration = %migration.name, "Migration failed");
            Error::database(e, format!("Migration failed: {}", migration.name))
        })?;

        sqlx::query(
            "INSERT INTO _keyplane_migrations (version, description, checksum, execution_time, installed_on) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(migration.version)
        .bind(&migration.name)
        .bind(migration.checksum())
        .bind(started.elapsed().as_millis() as i64)
        .bind(chrono::Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::database(e, format!("Failed to record migration: {}", migration.name)))?;

        tx.commit()
            .await
            .map_err(|e| Error::database(e, "Failed to commit migration transaction".to_string()))?;

        migrations_run += 1;
    }

    if migrations_run > 0 {
        info!(count = migrations_run, "Database migrations completed");
    } else {
        info!("No pending migrations");
    }

    Ok(())
}
