//! Bearer access token verification.
//!
//! Verification is signature/expiry on the JWT followed by a liveness check
//! against the current user record. The caller's roles are re-read from the
//! store so authorization decisions reflect current assignments, not the
//! token's snapshot.

use std::sync::Arc;

use tracing::{instrument, warn};

use crate::auth::jwt::JwtService;
use crate::auth::models::CurrentUser;
use crate::domain::UserId;
use crate::errors::{AuthErrorType, Error, Result};
use crate::storage::repositories::{RoleRepository, UserRepository};

const BEARER_PREFIX: &str = "Bearer ";

/// Verifies bearer credentials into a [`CurrentUser`].
#[derive(Clone)]
pub struct Authenticator {
    jwt: JwtService,
    user_repository: Arc<dyn UserRepository>,
    role_repository: Arc<dyn RoleRepository>,
}

impl Authenticator {
    pub fn new(
        jwt: JwtService,
        user_repository: Arc<dyn UserRepository>,
        role_repository: Arc<dyn RoleRepository>,
    ) -> Self {
        Self { jwt, user_repository, role_repository }
    }

    /// Authenticate an `Authorization` header value.
    #[instrument(skip(self, header))]
    pub async fn authenticate_header(&self, header: &str) -> Result<CurrentUser> {
        let token = header.strip_prefix(BEARER_PREFIX).map(str::trim).ok_or_else(|| {
            Error::auth("Missing or malformed bearer token", AuthErrorType::InvalidCredentials)
        })?;

        self.verify_access_token(token).await
    }

    /// Verify an access token and resolve the live caller behind it.
    #[instrument(skip(self, token))]
    pub async fn verify_access_token(&self, token: &str) -> Result<CurrentUser> {
        let claims = self.jwt.verify(token)?;
        let user_id = UserId::from_string(claims.sub.clone());

        let user = self.user_repository.get_user(&user_id).await?.ok_or_else(|| {
            warn!("access token subject no longer exists");
            Error::auth("Unknown token subject", AuthErrorType::InvalidCredentials)
        })?;

        if !user.is_active {
            warn!(user_id = %user.id, "access token for inactive account");
            return Err(Error::auth("Account is inactive", AuthErrorType::AccountInactive));
        }

        let roles = self.role_repository.roles_for_user(&user.id).await?;

        Ok(CurrentUser { user, roles })
    }
}
