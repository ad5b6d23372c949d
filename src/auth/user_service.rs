//! Account management service: create, update, and delete user accounts and
//! their role assignments.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::auth::hashing;
use crate::auth::role::Role;
use crate::auth::user::{
    ChangePasswordRequest, CreateUserRequest, NewUser, UpdateUser, UpdateUserRequest, User,
};
use crate::domain::{RoleId, UserId};
use crate::errors::{AuthErrorType, Error, Result};
use crate::storage::repositories::{
    AuditEvent, AuditLogRepository, RefreshTokenRepository, RoleRepository, UserRepository,
};

/// Service for user account administration.
pub struct UserService {
    user_repository: Arc<dyn UserRepository>,
    role_repository: Arc<dyn RoleRepository>,
    refresh_repository: Arc<dyn RefreshTokenRepository>,
    audit_repository: Arc<AuditLogRepository>,
}

impl UserService {
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        role_repository: Arc<dyn RoleRepository>,
        refresh_repository: Arc<dyn RefreshTokenRepository>,
        audit_repository: Arc<AuditLogRepository>,
    ) -> Self {
        Self { user_repository, role_repository, refresh_repository, audit_repository }
    }

    /// Create a user account. Every account receives the default role in
    /// addition to any explicitly requested roles.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User> {
        request.validate()?;

        let password_hash = hashing::hash_password(&request.password)?;
        let new_user = NewUser {
            id: UserId::new(),
            email: User::normalize_email(&request.email),
            password_hash,
            name: request.name.clone(),
            is_active: true,
            email_verified: request.email_verified,
            otp_enabled: request.otp_enabled,
        };

        let user = self.user_repository.create_user(new_user).await?;

        let mut role_ids: Vec<RoleId> = Vec::new();
        if let Some(default_role) = self.role_repository.get_default_role().await? {
            role_ids.push(default_role.id);
        }
        for role_id in &request.role_ids {
            if !role_ids.contains(role_id) {
                role_ids.push(role_id.clone());
            }
        }
        self.role_repository.set_user_roles(&user.id, &role_ids).await?;

        self.audit_repository
            .record_account_event(
                AuditEvent::auth(
                    "user.created",
                    Some(user.id.as_str()),
                    Some(&user.email),
                    json!({ "roles": role_ids.len() }),
                )
                .with_user(Some(user.id.to_string())),
            )
            .await?;

        info!(user_id = %user.id, "created user account");
        Ok(user)
    }

    pub async fn get_user(&self, id: &UserId) -> Result<User> {
        self.user_repository
            .get_user(id)
            .await?
            .ok_or_else(|| Error::not_found("user", id.as_str()))
    }

    pub async fn list_users(&self, limit: i64, offset: i64) -> Result<(Vec<User>, i64)> {
        let users = self.user_repository.list_users(limit, offset).await?;
        let total = self.user_repository.count_users().await?;
        Ok((users, total))
    }

    pub async fn roles_for_user(&self, id: &UserId) -> Result<Vec<Role>> {
        self.role_repository.roles_for_user(id).await
    }

    /// Update account details. Deactivating an account revokes every live
    /// session so the account cannot keep refreshing.
    #[instrument(skip(self, request), fields(user_id = %id))]
    pub async fn update_user(&self, id: &UserId, request: UpdateUserRequest) -> Result<User> {
        request.validate()?;

        let update = UpdateUser {
            email: request.email.as_deref().map(User::normalize_email),
            name: request.name,
            is_active: request.is_active,
            email_verified: request.email_verified,
            otp_enabled: request.otp_enabled,
        };
        let deactivated = update.is_active == Some(false);
        let user = self.user_repository.update_user(id, update).await?;

        if deactivated {
            let revoked = self.refresh_repository.revoke_all_for_user(id).await?;
            warn!(user_id = %id, revoked, "deactivated account, revoked live sessions");
        }

        self.audit_repository
            .record_account_event(
                AuditEvent::auth(
                    "user.updated",
                    Some(user.id.as_str()),
                    Some(&user.email),
                    json!({ "deactivated": deactivated }),
                )
                .with_user(Some(user.id.to_string())),
            )
            .await?;

        Ok(user)
    }

    /// Change a password after verifying the current one, then revoke every
    /// live session for the account.
    #[instrument(skip(self, request), fields(user_id = %id))]
    pub async fn change_password(&self, id: &UserId, request: ChangePasswordRequest) -> Result<()> {
        request.validate()?;

        let stored = self
            .user_repository
            .get_password_hash(id)
            .await?
            .ok_or_else(|| Error::not_found("user", id.as_str()))?;

        if !hashing::verify_password(&request.current_password, &stored)? {
            return Err(Error::auth(
                "Current password is incorrect",
                AuthErrorType::InvalidCredentials,
            ));
        }

        let new_hash = hashing::hash_password(&request.new_password)?;
        self.user_repository.update_password(id, new_hash).await?;
        let revoked = self.refresh_repository.revoke_all_for_user(id).await?;

        self.audit_repository
            .record_account_event(
                AuditEvent::auth(
                    "user.password_changed",
                    Some(id.as_str()),
                    None,
                    json!({ "revoked_sessions": revoked }),
                )
                .with_user(Some(id.to_string())),
            )
            .await?;

        info!(user_id = %id, revoked, "password changed, sessions revoked");
        Ok(())
    }

    /// Replace a user's role assignments. Takes effect on the next permission
    /// check; no re-login is required.
    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn set_user_roles(&self, id: &UserId, role_ids: &[RoleId]) -> Result<Vec<Role>> {
        // Every account holds at least one role at all times.
        if role_ids.is_empty() {
            return Err(Error::validation("A user must hold at least one role"));
        }

        // Resolve first so a bad role id fails the whole request.
        for role_id in role_ids {
            if self.role_repository.get_role(role_id).await?.is_none() {
                return Err(Error::not_found("role", role_id.as_str()));
            }
        }
        self.role_repository.set_user_roles(id, role_ids).await?;
        let roles = self.role_repository.roles_for_user(id).await?;

        self.audit_repository
            .record_account_event(
                AuditEvent::auth(
                    "user.roles_set",
                    Some(id.as_str()),
                    None,
                    json!({ "roles": roles.iter().map(|r| r.name.as_str()).collect::<Vec<_>>() }),
                )
                .with_user(Some(id.to_string())),
            )
            .await?;

        Ok(roles)
    }

    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn delete_user(&self, id: &UserId) -> Result<()> {
        let user = self.get_user(id).await?;
        self.refresh_repository.revoke_all_for_user(id).await?;
        self.user_repository.delete_user(id).await?;

        self.audit_repository
            .record_account_event(AuditEvent::auth(
                "user.deleted",
                Some(id.as_str()),
                Some(&user.email),
                json!({}),
            ))
            .await?;

        Ok(())
    }
}
