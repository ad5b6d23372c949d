//! Access/refresh token issuance, rotation, and revocation.
//!
//! Refresh tokens are opaque values (format: kp_rt_{id}.{secret}) whose
//! secrets are stored only as Argon2 hashes. Rotation revokes the presented
//! token with a compare-and-swap before minting its successor, so a token is
//! usable exactly once. Presenting an already-revoked token is treated as
//! reuse of a stolen token and revokes every live session the user holds.

use std::sync::Arc;

use argon2::Argon2;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use serde_json::json;
use tracing::{field, info, instrument, warn};

use crate::auth::hashing;
use crate::auth::jwt::JwtService;
use crate::auth::models::{parse_refresh_token, NewRefreshToken, TokenPair, REFRESH_TOKEN_PREFIX};
use crate::auth::revalidation::AdminRevalidator;
use crate::auth::role::Role;
use crate::auth::user::{User, UserResponse};
use crate::auth::permissions;
use crate::domain::{SessionId, UserId};
use crate::errors::{AuthErrorType, Error, Result};
use crate::observability::metrics;
use crate::storage::repositories::{
    AuditEvent, AuditLogRepository, RefreshTokenRepository, RoleRepository, UserRepository,
};

/// Refresh token secret byte length (48 bytes = 384 bits of entropy)
const REFRESH_SECRET_BYTES: usize = 48;

#[derive(Clone)]
pub struct TokenService {
    refresh_repository: Arc<dyn RefreshTokenRepository>,
    user_repository: Arc<dyn UserRepository>,
    role_repository: Arc<dyn RoleRepository>,
    audit_repository: Arc<AuditLogRepository>,
    revalidator: AdminRevalidator,
    jwt: JwtService,
    argon2: Arc<Argon2<'static>>,
    refresh_ttl: Duration,
}

impl TokenService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        refresh_repository: Arc<dyn RefreshTokenRepository>,
        user_repository: Arc<dyn UserRepository>,
        role_repository: Arc<dyn RoleRepository>,
        audit_repository: Arc<AuditLogRepository>,
        jwt: JwtService,
        refresh_ttl: Duration,
    ) -> Self {
        let revalidator = AdminRevalidator::new(role_repository.clone());
        Self {
            refresh_repository,
            user_repository,
            role_repository,
            audit_repository,
            revalidator,
            jwt,
            argon2: Arc::new(hashing::password_hasher()),
            refresh_ttl,
        }
    }

    /// Issue a fresh token pair for a newly authenticated user, starting a new
    /// rotation chain. The chain records whether the session carries admin
    /// scope so every later refresh revalidates it.
    #[instrument(skip(self, user, roles), fields(user_id = %user.id, correlation_id = field::Empty))]
    pub async fn issue(&self, user: &User, roles: &[Role]) -> Result<TokenPair> {
        tracing::Span::current().record("correlation_id", field::display(&uuid::Uuid::new_v4()));

        let session_id = SessionId::new();
        let admin_scope = permissions::can_access_admin_features(roles);
        let tokens = self.mint_pair(user, roles, &session_id, admin_scope).await?;

        self.audit_repository
            .record_auth_event(
                AuditEvent::auth(
                    "auth.session.issued",
                    Some(session_id.as_str()),
                    None,
                    json!({ "admin_scope": admin_scope }),
                )
                .with_user(Some(user.id.to_string())),
            )
            .await?;

        metrics::record_token_issued().await;
        self.update_active_sessions_gauge().await;
        info!(user_id = %user.id, session_id = %session_id, "Token pair issued");

        Ok(tokens)
    }

    /// Rotate a presented refresh token: exactly one concurrent caller wins.
    /// Claims are recomputed from the user's current roles, and admin-scoped
    /// chains re-run the privilege revalidation before new tokens are minted.
    #[instrument(skip(self, presented_token), fields(correlation_id = field::Empty))]
    pub async fn refresh(&self, presented_token: &str) -> Result<(TokenPair, UserResponse)> {
        tracing::Span::current().record("correlation_id", field::display(&uuid::Uuid::new_v4()));

        let (record_id, secret) = parse_refresh_token(presented_token).ok_or_else(|| {
            Error::auth("Malformed refresh token", AuthErrorType::RefreshTokenInvalid)
        })?;

        let record = self.refresh_repository.get(&record_id).await?.ok_or_else(|| {
            Error::auth("Unknown refresh token", AuthErrorType::RefreshTokenInvalid)
        })?;

        if !hashing::verify_secret(&self.argon2, &record.token_hash, &secret)? {
            return Err(Error::auth(
                "Refresh token secret mismatch",
                AuthErrorType::RefreshTokenInvalid,
            ));
        }

        // A revoked-but-otherwise-valid token means the single-use invariant
        // was violated: someone is replaying an old token. Revoke everything
        // the user holds, not just this call.
        if record.revoked {
            return self.handle_reuse(&record.user_id, &record.session_id).await;
        }

        if record.is_expired(Utc::now()) {
            self.refresh_repository.revoke(&record.id).await?;
            metrics::record_token_revoked("expired").await;
            return Err(Error::auth(
                "Refresh token has expired",
                AuthErrorType::RefreshTokenExpired,
            ));
        }

        // Compare-and-swap: the loser of a concurrent rotation observes the
        // token as already revoked and is treated as reuse.
        if !self.refresh_repository.revoke_if_active(&record.id).await? {
            return self.handle_reuse(&record.user_id, &record.session_id).await;
        }

        let user = self
            .user_repository
            .get_user(&record.user_id)
            .await?
            .ok_or_else(|| Error::auth("Unknown user", AuthErrorType::RefreshTokenInvalid))?;

        if !user.is_active {
            self.refresh_repository.revoke_session(&record.session_id).await?;
            metrics::record_token_revoked("account_inactive").await;
            return Err(Error::auth("Account is inactive", AuthErrorType::AccountInactive));
        }

        // Claims come from current role assignments, never the old snapshot.
        let roles = self.role_repository.roles_for_user(&user.id).await?;

        if record.admin_scope {
            if let Err(err) = self.revalidator.ensure_still_admin(&user.id).await {
                self.refresh_repository.revoke_session(&record.session_id).await?;
                metrics::record_token_revoked("admin_revoked").await;
                return Err(err);
            }
        }

        let tokens = self.mint_pair(&user, &roles, &record.session_id, record.admin_scope).await?;

        self.audit_repository
            .record_auth_event(
                AuditEvent::auth(
                    "auth.session.refreshed",
                    Some(record.session_id.as_str()),
                    None,
                    json!({ "rotated_from": record.id }),
                )
                .with_user(Some(user.id.to_string())),
            )
            .await?;

        metrics::record_token_refreshed().await;
        info!(user_id = %user.id, session_id = %record.session_id, "Refresh token rotated");

        Ok((tokens, UserResponse::from(user)))
    }

    /// Revoke the session chain behind a presented refresh token. Best-effort:
    /// unknown or malformed tokens are ignored so logout always succeeds.
    #[instrument(skip(self, presented_token))]
    pub async fn revoke(&self, presented_token: &str) -> Result<()> {
        let Some((record_id, secret)) = parse_refresh_token(presented_token) else {
            return Ok(());
        };

        let Some(record) = self.refresh_repository.get(&record_id).await? else {
            return Ok(());
        };

        if !hashing::verify_secret(&self.argon2, &record.token_hash, &secret)? {
            return Ok(());
        }

        let revoked = self.refresh_repository.revoke_session(&record.session_id).await?;
        if revoked > 0 {
            self.audit_repository
                .record_auth_event(
                    AuditEvent::auth(
                        "auth.session.logout",
                        Some(record.session_id.as_str()),
                        None,
                        json!({ "revoked": revoked }),
                    )
                    .with_user(Some(record.user_id.to_string())),
                )
                .await?;
            metrics::record_token_revoked("logout").await;
            self.update_active_sessions_gauge().await;
        }

        Ok(())
    }

    /// Revoke every live session a user holds; idempotent. Used by password
    /// changes and account deactivation.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn revoke_all(&self, user_id: &UserId) -> Result<u64> {
        let revoked = self.refresh_repository.revoke_all_for_user(user_id).await?;
        if revoked > 0 {
            self.audit_repository
                .record_auth_event(
                    AuditEvent::auth(
                        "auth.session.revoked_all",
                        Some(user_id.as_str()),
                        None,
                        json!({ "revoked": revoked }),
                    )
                    .with_user(Some(user_id.to_string())),
                )
                .await?;
            metrics::record_token_revoked("revoke_all").await;
            self.update_active_sessions_gauge().await;
        }

        Ok(revoked)
    }

    async fn handle_reuse(
        &self,
        user_id: &UserId,
        session_id: &SessionId,
    ) -> Result<(TokenPair, UserResponse)> {
        let revoked = self.refresh_repository.revoke_all_for_user(user_id).await?;

        self.audit_repository
            .record_auth_event(
                AuditEvent::auth(
                    "auth.session.reuse_detected",
                    Some(session_id.as_str()),
                    None,
                    json!({ "revoked": revoked }),
                )
                .with_user(Some(user_id.to_string())),
            )
            .await?;

        metrics::record_token_revoked("reuse_detected").await;
        self.update_active_sessions_gauge().await;
        warn!(user_id = %user_id, session_id = %session_id, revoked, "Refresh token reuse detected, all sessions revoked");

        Err(Error::auth(
            "Refresh token has already been used",
            AuthErrorType::RefreshTokenReused,
        ))
    }

    async fn mint_pair(
        &self,
        user: &User,
        roles: &[Role],
        session_id: &SessionId,
        admin_scope: bool,
    ) -> Result<TokenPair> {
        let access_token = self.jwt.issue(user, roles)?;

        let record_id = uuid::Uuid::new_v4().to_string();
        let secret = generate_refresh_secret();
        let token_hash = hashing::hash_secret(&self.argon2, &secret)?;

        self.refresh_repository
            .create(NewRefreshToken {
                id: record_id.clone(),
                session_id: session_id.clone(),
                user_id: user.id.clone(),
                token_hash,
                admin_scope,
                expires_at: Utc::now() + self.refresh_ttl,
            })
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token: format!("{}{}.{}", REFRESH_TOKEN_PREFIX, record_id, secret),
            expires_in: self.jwt.ttl_seconds(),
        })
    }

    async fn update_active_sessions_gauge(&self) {
        if let Ok(count) = self.refresh_repository.count_active().await {
            metrics::set_active_sessions(count.max(0) as usize).await;
        }
    }
}

fn generate_refresh_secret() -> String {
    let mut bytes = [0u8; REFRESH_SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_secret_is_url_safe_and_unique() {
        let a = generate_refresh_secret();
        let b = generate_refresh_secret();

        assert_ne!(a, b);
        assert!(!a.contains('+'));
        assert!(!a.contains('/'));
        assert!(!a.contains('='));
        // 48 bytes encode to 64 base64 characters without padding
        assert_eq!(a.len(), 64);
    }
}
