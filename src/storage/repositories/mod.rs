//! Repository modules for data access
//!
//! This module provides repository implementations split into focused, manageable files.
//! Each repository handles CRUD operations for a specific resource type.

pub mod audit_log;
pub mod otp_challenge;
pub mod refresh_token;
pub mod role;
pub mod user;

pub use audit_log::{AuditEvent, AuditLogRepository};
pub use otp_challenge::{OtpChallengeRepository, SqlxOtpChallengeRepository};
pub use refresh_token::{RefreshTokenRepository, SqlxRefreshTokenRepository};
pub use role::{
    PermissionRepository, RoleRepository, SqlxPermissionRepository, SqlxRoleRepository,
};
pub use user::{SqlxUserRepository, UserRepository};
