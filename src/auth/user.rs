//! User domain models and data structures.
//!
//! This module defines the core user entity and its associated
//! request/response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::domain::{RoleId, UserId};

/// Stored representation of a user account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub is_active: bool,
    pub email_verified: bool,
    pub otp_enabled: bool,
    pub login_attempts: i64,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Normalize email to lowercase for consistent storage and comparison.
    pub fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }
}

/// New user creation payload with a pre-hashed password.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub is_active: bool,
    pub email_verified: bool,
    pub otp_enabled: bool,
}

/// Update payload for an existing user.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub name: Option<String>,
    pub is_active: Option<bool>,
    pub email_verified: Option<bool>,
    pub otp_enabled: Option<bool>,
}

/// Request to create a new user account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    /// Roles to assign in addition to the default role.
    #[serde(default)]
    pub role_ids: Vec<RoleId>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub otp_enabled: bool,
}

/// Request to update an existing user account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    pub is_active: Option<bool>,
    pub email_verified: Option<bool>,
    pub otp_enabled: Option<bool>,
}

/// Request to change a user's password. Revokes every active session on success.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

/// User authentication credentials.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Response shape for a user account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub is_active: bool,
    pub email_verified: bool,
    pub otp_enabled: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            is_active: user.is_active,
            email_verified: user.email_verified,
            otp_enabled: user.otp_enabled,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_normalization() {
        assert_eq!(User::normalize_email("Test@Example.COM"), "test@example.com");
        assert_eq!(User::normalize_email("  user@HOST.com  "), "user@host.com");
    }

    #[test]
    fn create_user_request_defaults() {
        let json = r#"{
            "email": "test@example.com",
            "password": "SecureP@ssw0rd",
            "name": "Test User"
        }"#;

        let request: CreateUserRequest = serde_json::from_str(json).unwrap();
        assert!(request.role_ids.is_empty());
        assert!(!request.email_verified);
        assert!(!request.otp_enabled);
    }

    #[test]
    fn create_user_request_rejects_short_password() {
        let request = CreateUserRequest {
            email: "test@example.com".to_string(),
            password: "short".to_string(),
            name: "Test User".to_string(),
            role_ids: vec![],
            email_verified: false,
            otp_enabled: false,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn update_user_request_partial() {
        let json = r#"{
            "name": "Updated Name"
        }"#;

        let request: UpdateUserRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.name, Some("Updated Name".to_string()));
        assert!(request.email.is_none());
        assert!(request.is_active.is_none());
    }

    #[test]
    fn user_response_conversion() {
        let user = User {
            id: UserId::new(),
            email: "test@example.com".to_string(),
            name: "Test User".to_string(),
            is_active: true,
            email_verified: true,
            otp_enabled: false,
            login_attempts: 0,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let response: UserResponse = user.clone().into();
        assert_eq!(response.id, user.id);
        assert_eq!(response.email, user.email);
        assert!(response.is_active);
    }
}
