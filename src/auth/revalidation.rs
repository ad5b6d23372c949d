//! Admin privilege revalidation.
//!
//! Runs at the end of login and of every successful refresh for sessions that
//! carry admin scope. Roles are re-read from the store, never taken from token
//! claims, so a role removed mid-session is observed on the next refresh.

use std::sync::Arc;

use tracing::{instrument, warn};

use crate::auth::permissions;
use crate::domain::UserId;
use crate::errors::{AuthErrorType, Error, Result};
use crate::storage::repositories::RoleRepository;

#[derive(Clone)]
pub struct AdminRevalidator {
    role_repository: Arc<dyn RoleRepository>,
}

impl AdminRevalidator {
    pub fn new(role_repository: Arc<dyn RoleRepository>) -> Self {
        Self { role_repository }
    }

    /// Fresh read of the user's roles followed by the admin capability check.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn still_admin(&self, user_id: &UserId) -> Result<bool> {
        let roles = self.role_repository.roles_for_user(user_id).await?;
        Ok(permissions::can_access_admin_features(&roles))
    }

    /// Fail with `AdminRevoked` when a previously admin-scoped caller no
    /// longer holds the capability. Distinguishes "access was revoked
    /// mid-session" from "never had access".
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn ensure_still_admin(&self, user_id: &UserId) -> Result<()> {
        if self.still_admin(user_id).await? {
            return Ok(());
        }

        warn!(user_id = %user_id, "Admin privilege revoked mid-session");
        Err(Error::auth(
            "Administrative privilege has been revoked",
            AuthErrorType::AdminRevoked,
        ))
    }
}
