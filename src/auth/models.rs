//! Core authentication models: login outcomes, token pairs, refresh token
//! records, and OTP challenges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::role::Role;
use crate::auth::user::{User, UserResponse};
use crate::domain::{SessionId, UserId};
use crate::errors::AuthErrorType;

/// Prefix for opaque refresh token values (format: kp_rt_{id}.{secret}).
pub const REFRESH_TOKEN_PREFIX: &str = "kp_rt_";

/// An issued access/refresh token pair.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Short-lived signed JWT carrying the claims snapshot.
    pub access_token: String,
    /// Long-lived opaque token, single-use, rotated on refresh.
    pub refresh_token: String,
    /// Seconds until the access token expires.
    pub expires_in: i64,
}

/// Why a login or refresh was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeniedReason {
    InvalidCredentials,
    AccountInactive,
}

impl DeniedReason {
    pub fn error_type(&self) -> AuthErrorType {
        match self {
            DeniedReason::InvalidCredentials => AuthErrorType::InvalidCredentials,
            DeniedReason::AccountInactive => AuthErrorType::AccountInactive,
        }
    }
}

/// Terminal result of a login call. `OtpRequired` and
/// `EmailVerificationRequired` need a new client-initiated call to progress.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Authenticated { tokens: TokenPair, user: UserResponse },
    OtpRequired { user_id: UserId },
    EmailVerificationRequired { email: String },
    Denied(DeniedReason),
}

/// Persisted refresh token record. A rotation chain shares one session id;
/// exactly one record per chain is live at a time.
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub id: String,
    pub session_id: SessionId,
    pub user_id: UserId,
    pub token_hash: String,
    /// Whether the session was established with admin capability. Forces
    /// admin revalidation on every refresh in the chain.
    pub admin_scope: bool,
    pub revoked: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Insert payload for a refresh token record.
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub id: String,
    pub session_id: SessionId,
    pub user_id: UserId,
    pub token_hash: String,
    pub admin_scope: bool,
    pub expires_at: DateTime<Utc>,
}

/// Persisted OTP challenge. At most one active challenge per user.
#[derive(Debug, Clone)]
pub struct OtpChallenge {
    pub user_id: UserId,
    pub code_hash: String,
    pub attempts: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl OtpChallenge {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Insert payload for an OTP challenge, replacing any prior challenge.
#[derive(Debug, Clone)]
pub struct NewOtpChallenge {
    pub user_id: UserId,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// The authenticated caller attached to a request after bearer verification.
/// Roles are loaded fresh from the store, not taken from token claims.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub roles: Vec<Role>,
}

impl CurrentUser {
    pub fn id(&self) -> &UserId {
        &self.user.id
    }
}

/// Parse an opaque refresh token into its (record id, secret) parts.
pub fn parse_refresh_token(token: &str) -> Option<(String, String)> {
    let (id_part, secret) = token.split_once('.')?;
    let id = id_part.strip_prefix(REFRESH_TOKEN_PREFIX)?;
    if id.is_empty() || secret.is_empty() {
        return None;
    }
    Some((id.to_string(), secret.to_string()))
}
