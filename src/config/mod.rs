//! # Configuration Management
//!
//! Configuration structures for the keyplane identity plane. Every section can
//! be loaded from environment variables (`KEYPLANE_*`) and is validated with
//! the `validator` crate plus custom cross-field checks.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env_var(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| Error::config(format!("Invalid value for {}: '{}'", name, raw))),
        None => Ok(default),
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct AppConfig {
    /// HTTP server configuration
    #[validate(nested)]
    pub server: ServerConfig,

    /// Database configuration
    #[validate(nested)]
    pub database: DatabaseConfig,

    /// Authentication configuration
    #[validate(nested)]
    pub auth: AuthConfig,

    /// Observability configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load the full configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let config = Self {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            auth: AuthConfig::from_env()?,
            observability: ObservabilityConfig::from_env()?,
        };
        config.validate_all()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate_all(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;
        self.validate_custom()
    }

    /// Custom validation logic that goes beyond what the validator crate can do
    fn validate_custom(&self) -> Result<()> {
        if !self.database.url.starts_with("sqlite:") {
            return Err(Error::validation("Database URL must start with 'sqlite:'"));
        }

        if self.auth.jwt_secret.len() < 32 {
            return Err(Error::validation("JWT secret must be at least 32 characters long"));
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    /// Server bind address
    #[validate(length(min = 1, message = "Host cannot be empty"))]
    pub host: String,

    /// Server port
    #[validate(range(min = 1, message = "Port must be between 1 and 65535"))]
    pub port: u16,

    /// Enable permissive CORS (development convenience)
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8080, enable_cors: false }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            host: env_var("KEYPLANE_API_HOST").unwrap_or(defaults.host),
            port: env_parse("KEYPLANE_API_PORT", defaults.port)?,
            enable_cors: env_parse("KEYPLANE_API_ENABLE_CORS", defaults.enable_cors)?,
        })
    }

    /// Get the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[validate(length(min = 1, message = "Database URL cannot be empty"))]
    pub url: String,

    /// Maximum number of connections in the pool
    #[validate(range(min = 1, max = 100, message = "Max connections must be between 1 and 100"))]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[validate(range(min = 1, max = 60, message = "Connect timeout must be between 1 and 60 seconds"))]
    pub connect_timeout_seconds: u64,

    /// Idle timeout in seconds (0 = no timeout)
    pub idle_timeout_seconds: u64,

    /// Enable automatic migrations
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/keyplane.db".to_string(),
            max_connections: 10,
            min_connections: 0,
            connect_timeout_seconds: 10,
            idle_timeout_seconds: 600,
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            url: env_var("KEYPLANE_DATABASE_URL").unwrap_or(defaults.url),
            max_connections: env_parse("KEYPLANE_DATABASE_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: env_parse("KEYPLANE_DATABASE_MIN_CONNECTIONS", defaults.min_connections)?,
            connect_timeout_seconds: defaults.connect_timeout_seconds,
            idle_timeout_seconds: defaults.idle_timeout_seconds,
            auto_migrate: env_parse("KEYPLANE_DATABASE_AUTO_MIGRATE", defaults.auto_migrate)?,
        })
    }

    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Get idle timeout as Duration (None if 0)
    pub fn idle_timeout(&self) -> Option<Duration> {
        if self.idle_timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.idle_timeout_seconds))
        }
    }

    pub fn is_sqlite(&self) -> bool {
        self.url.starts_with("sqlite:")
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AuthConfig {
    /// HMAC secret for signing access tokens
    #[validate(length(min = 32, message = "JWT secret must be at least 32 characters"))]
    pub jwt_secret: String,

    /// Access token lifetime in minutes (stateless, short-lived)
    #[validate(range(min = 1, max = 1440, message = "Access token TTL must be 1-1440 minutes"))]
    pub access_token_ttl_minutes: i64,

    /// Refresh token lifetime in days (opaque, persisted)
    #[validate(range(min = 1, max = 365, message = "Refresh token TTL must be 1-365 days"))]
    pub refresh_token_ttl_days: i64,

    /// One-time code lifetime in minutes
    #[validate(range(min = 1, max = 60, message = "OTP TTL must be 1-60 minutes"))]
    pub otp_ttl_minutes: i64,

    /// Maximum OTP verification attempts before the challenge is destroyed
    #[validate(range(min = 1, max = 10, message = "OTP max attempts must be 1-10"))]
    pub otp_max_attempts: i64,

    /// Optional bootstrap admin email, seeded on first start
    pub bootstrap_admin_email: Option<String>,

    /// Optional bootstrap admin password, seeded on first start
    pub bootstrap_admin_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            access_token_ttl_minutes: 15,
            refresh_token_ttl_days: 7,
            otp_ttl_minutes: 5,
            otp_max_attempts: 5,
            bootstrap_admin_email: None,
            bootstrap_admin_password: None,
        }
    }
}

impl AuthConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let jwt_secret = env_var("KEYPLANE_JWT_SECRET")
            .ok_or_else(|| Error::config("KEYPLANE_JWT_SECRET must be set"))?;

        Ok(Self {
            jwt_secret,
            access_token_ttl_minutes: env_parse(
                "KEYPLANE_ACCESS_TOKEN_TTL_MINUTES",
                defaults.access_token_ttl_minutes,
            )?,
            refresh_token_ttl_days: env_parse(
                "KEYPLANE_REFRESH_TOKEN_TTL_DAYS",
                defaults.refresh_token_ttl_days,
            )?,
            otp_ttl_minutes: env_parse("KEYPLANE_OTP_TTL_MINUTES", defaults.otp_ttl_minutes)?,
            otp_max_attempts: env_parse("KEYPLANE_OTP_MAX_ATTEMPTS", defaults.otp_max_attempts)?,
            bootstrap_admin_email: env_var("KEYPLANE_BOOTSTRAP_ADMIN_EMAIL"),
            bootstrap_admin_password: env_var("KEYPLANE_BOOTSTRAP_ADMIN_PASSWORD"),
        })
    }

    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.access_token_ttl_minutes)
    }

    pub fn refresh_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.refresh_token_ttl_days)
    }

    pub fn otp_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.otp_ttl_minutes)
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Service name reported in logs and metrics
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,

    /// Log level filter (tracing env-filter syntax)
    pub log_level: String,

    /// Emit logs as JSON
    pub json_logs: bool,

    /// Enable the Prometheus metrics exporter
    pub enable_metrics: bool,

    /// Metrics exporter bind address (host:port)
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "keyplane".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            enable_metrics: false,
            metrics_address: None,
        }
    }
}

impl ObservabilityConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            service_name: env_var("KEYPLANE_SERVICE_NAME").unwrap_or(defaults.service_name),
            log_level: env_var("KEYPLANE_LOG_LEVEL").unwrap_or(defaults.log_level),
            json_logs: env_parse("KEYPLANE_JSON_LOGS", defaults.json_logs)?,
            enable_metrics: env_parse("KEYPLANE_ENABLE_METRICS", defaults.enable_metrics)?,
            metrics_address: env_var("KEYPLANE_METRICS_ADDRESS"),
        })
    }
}
