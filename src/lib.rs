//! # Keyplane
//!
//! Keyplane is an admin-facing identity control plane: credential login with
//! optional OTP second factor, short-lived JWT access tokens paired with
//! single-use rotating refresh tokens, and role-based authorization resolved
//! fresh on every request.
//!
//! ## Architecture
//!
//! The system follows a layered architecture pattern:
//!
//! ```text
//! REST API Layer → Auth Services → Persistence Layer
//!      ↓                ↓                ↓
//! Route Guards    Token Rotation    Observability Stack
//! ```
//!
//! ## Core Components
//!
//! - **REST API Layer**: Axum-based HTTP server for the identity surface
//! - **Login Service**: credential verification and login orchestration
//! - **Token Service**: access token issuance and refresh token rotation
//! - **Authorization Guard**: per-route requirements over fresh role data
//! - **Persistence Layer**: SQLx with SQLite for accounts, roles, and sessions

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod errors;
pub mod observability;
pub mod storage;

// Re-export commonly used types and traits
pub use config::AppConfig;
pub use errors::{Error, Result};
pub use observability::{init_tracing, HealthChecker};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
