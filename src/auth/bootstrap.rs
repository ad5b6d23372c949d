//! First-start bootstrap of the administrative account.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, instrument, warn};

use crate::auth::hashing;
use crate::auth::role::ADMIN_ROLE_NAME;
use crate::auth::user::{NewUser, User};
use crate::config::AuthConfig;
use crate::domain::UserId;
use crate::errors::{Error, Result};
use crate::storage::repositories::{
    AuditEvent, AuditLogRepository, RoleRepository, UserRepository,
};

/// Seed the bootstrap admin account if one is configured and missing.
///
/// Idempotent: an existing account with the configured email is left alone
/// apart from ensuring it still carries the admin role.
#[instrument(skip_all)]
pub async fn ensure_bootstrap_admin(
    config: &AuthConfig,
    user_repository: &Arc<dyn UserRepository>,
    role_repository: &Arc<dyn RoleRepository>,
    audit_repository: &Arc<AuditLogRepository>,
) -> Result<()> {
    let (email, password) = match (&config.bootstrap_admin_email, &config.bootstrap_admin_password)
    {
        (Some(email), Some(password)) => (email, password),
        (Some(_), None) | (None, Some(_)) => {
            warn!("bootstrap admin requires both email and password, skipping");
            return Ok(());
        }
        (None, None) => return Ok(()),
    };

    let admin_role = role_repository
        .get_role_by_name(ADMIN_ROLE_NAME)
        .await?
        .ok_or_else(|| Error::internal("Admin role is missing, migrations did not run"))?;

    if let Some(existing) = user_repository.get_user_by_email(email).await? {
        let has_admin = role_repository
            .roles_for_user(&existing.id)
            .await?
            .iter()
            .any(|role| role.is_admin_role());
        if !has_admin {
            role_repository.assign_role(&existing.id, &admin_role.id).await?;
            info!(user_id = %existing.id, "restored admin role on bootstrap account");
        }
        return Ok(());
    }

    let password_hash = hashing::hash_password(password)?;
    let user = user_repository
        .create_user(NewUser {
            id: UserId::new(),
            email: User::normalize_email(email),
            password_hash,
            name: "Bootstrap Admin".to_string(),
            is_active: true,
            email_verified: true,
            otp_enabled: false,
        })
        .await?;

    role_repository.assign_role(&user.id, &admin_role.id).await?;
    if let Some(default_role) = role_repository.get_default_role().await? {
        role_repository.assign_role(&user.id, &default_role.id).await?;
    }

    audit_repository
        .record_account_event(
            AuditEvent::auth(
                "user.bootstrap_admin",
                Some(user.id.as_str()),
                Some(&user.email),
                json!({}),
            )
            .with_user(Some(user.id.to_string())),
        )
        .await?;

    info!(user_id = %user.id, "seeded bootstrap admin account");
    Ok(())
}
