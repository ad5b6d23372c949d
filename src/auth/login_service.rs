//! Credential verification and login orchestration.
//!
//! Login is a terminal state machine per call: credentials are checked, then
//! the account gate, the email-verification gate, and the OTP gate decide the
//! next step. Tokens are only issued on the fully authenticated path.

use std::sync::{Arc, LazyLock};

use serde_json::json;
use tracing::{info, instrument, warn};

use crate::auth::models::{DeniedReason, LoginOutcome};
use crate::auth::otp_service::OtpService;
use crate::auth::token_service::TokenService;
use crate::auth::user::{LoginRequest, User, UserResponse};
use crate::auth::hashing;
use crate::errors::Result;
use crate::observability::metrics;
use crate::storage::repositories::{
    AuditEvent, AuditLogRepository, RoleRepository, UserRepository,
};

/// Pre-computed dummy hash for timing-safe user enumeration prevention.
/// When a non-existent email is used, we still run Argon2 verification against
/// this hash so the response time matches real verification.
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
    hashing::hash_password("dummy_startup_value")
        .unwrap_or_else(|_| "$argon2id$v=19$m=19456,t=2,p=1$dW5rbm93bg$dW5rbm93bg".to_string())
});

/// Service for handling email/password authentication.
#[derive(Clone)]
pub struct LoginService {
    user_repository: Arc<dyn UserRepository>,
    role_repository: Arc<dyn RoleRepository>,
    audit_repository: Arc<AuditLogRepository>,
    otp_service: Arc<OtpService>,
    token_service: Arc<TokenService>,
}

impl LoginService {
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        role_repository: Arc<dyn RoleRepository>,
        audit_repository: Arc<AuditLogRepository>,
        otp_service: Arc<OtpService>,
        token_service: Arc<TokenService>,
    ) -> Self {
        Self { user_repository, role_repository, audit_repository, otp_service, token_service }
    }

    /// Verify credentials and orchestrate the next login step.
    ///
    /// The outcome is terminal for this call: `OtpRequired` and
    /// `EmailVerificationRequired` need a new client-initiated call to make
    /// progress, and no tokens exist on any non-`Authenticated` path.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginOutcome> {
        let email = User::normalize_email(&request.email);

        let (user, password_hash) =
            match self.user_repository.get_user_with_password(&email).await? {
                Some(result) => result,
                None => {
                    // Prevent timing-based user enumeration: perform dummy hash
                    // verification so response time matches real verification
                    if let Err(e) = hashing::verify_password(&request.password, &DUMMY_HASH) {
                        warn!(error = %e, "dummy hash verification failed unexpectedly");
                    }
                    warn!("login attempt for non-existent user");
                    metrics::record_authentication("invalid_credentials").await;
                    return Ok(LoginOutcome::Denied(DeniedReason::InvalidCredentials));
                }
            };

        let password_matches = hashing::verify_password(&request.password, &password_hash)?;
        if !password_matches {
            self.user_repository.increment_login_attempts(&user.id).await?;
            metrics::record_authentication("invalid_credentials").await;
            self.record_failure(&user, "invalid_password").await?;
            warn!(user_id = %user.id, "login attempt with incorrect password");
            return Ok(LoginOutcome::Denied(DeniedReason::InvalidCredentials));
        }

        // An inactive account is denied regardless of password correctness.
        if !user.is_active {
            metrics::record_authentication("account_inactive").await;
            self.record_failure(&user, "account_inactive").await?;
            warn!(user_id = %user.id, "login attempt for inactive account");
            return Ok(LoginOutcome::Denied(DeniedReason::AccountInactive));
        }

        // The password gate has passed; clear the failure counter. The login
        // timestamp is only stamped once the flow completes in issue_for.
        self.user_repository.reset_login_attempts(&user.id).await?;

        if !user.email_verified {
            metrics::record_authentication("email_verification_required").await;
            info!(user_id = %user.id, "login requires email verification");
            return Ok(LoginOutcome::EmailVerificationRequired { email: user.email });
        }

        if user.otp_enabled {
            self.otp_service.generate(&user.id).await?;
            metrics::record_authentication("otp_required").await;
            info!(user_id = %user.id, "login requires OTP second factor");
            return Ok(LoginOutcome::OtpRequired { user_id: user.id });
        }

        self.issue_for(user).await
    }

    /// Complete a pending OTP login: verify the code, then issue tokens.
    #[instrument(skip(self, submitted_code), fields(user_id = %user_id))]
    pub async fn complete_otp_login(
        &self,
        user_id: &crate::domain::UserId,
        submitted_code: &str,
    ) -> Result<LoginOutcome> {
        self.otp_service.verify(user_id, submitted_code).await?;

        let Some(user) = self.user_repository.get_user(user_id).await? else {
            metrics::record_authentication("invalid_credentials").await;
            return Ok(LoginOutcome::Denied(DeniedReason::InvalidCredentials));
        };

        if !user.is_active {
            metrics::record_authentication("account_inactive").await;
            return Ok(LoginOutcome::Denied(DeniedReason::AccountInactive));
        }

        self.issue_for(user).await
    }

    async fn issue_for(&self, user: User) -> Result<LoginOutcome> {
        self.user_repository.record_login_success(&user.id).await?;

        let roles = self.role_repository.roles_for_user(&user.id).await?;
        let tokens = self.token_service.issue(&user, &roles).await?;

        self.audit_repository
            .record_auth_event(
                AuditEvent::auth(
                    "auth.login.success",
                    Some(user.id.as_str()),
                    Some(&user.email),
                    json!({ "roles": roles.iter().map(|r| &r.name).collect::<Vec<_>>() }),
                )
                .with_user(Some(user.id.to_string())),
            )
            .await?;

        metrics::record_authentication("success").await;
        info!(user_id = %user.id, "user logged in successfully");

        Ok(LoginOutcome::Authenticated { tokens, user: UserResponse::from(user) })
    }

    async fn record_failure(&self, user: &User, reason: &str) -> Result<()> {
        self.audit_repository
            .record_auth_event(
                AuditEvent::auth(
                    "auth.login.failed",
                    Some(user.id.as_str()),
                    Some(&user.email),
                    json!({ "reason": reason }),
                )
                .with_user(Some(user.id.to_string())),
            )
            .await
    }
}
