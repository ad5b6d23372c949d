//! OTP second-factor challenge manager.
//!
//! Codes are 6-digit, drawn from OS randomness, stored only as Argon2 hashes,
//! and bounded by a TTL and an attempt budget. Attempt accounting happens in
//! the store so concurrent verifies cannot stretch the budget.

use std::sync::Arc;

use argon2::Argon2;
use chrono::{Duration, Utc};
use rand::{rngs::OsRng, Rng};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::auth::hashing;
use crate::auth::models::NewOtpChallenge;
use crate::domain::UserId;
use crate::errors::{AuthErrorType, Error, Result};
use crate::observability::metrics;
use crate::storage::repositories::{AuditEvent, AuditLogRepository, OtpChallengeRepository};

#[derive(Clone)]
pub struct OtpService {
    challenge_repository: Arc<dyn OtpChallengeRepository>,
    audit_repository: Arc<AuditLogRepository>,
    argon2: Arc<Argon2<'static>>,
    ttl: Duration,
    max_attempts: i64,
}

impl OtpService {
    pub fn new(
        challenge_repository: Arc<dyn OtpChallengeRepository>,
        audit_repository: Arc<AuditLogRepository>,
        ttl: Duration,
        max_attempts: i64,
    ) -> Self {
        Self {
            challenge_repository,
            audit_repository,
            argon2: Arc::new(hashing::password_hasher()),
            ttl,
            max_attempts,
        }
    }

    /// Create a challenge for a pending login, discarding any prior one.
    /// Returns the plaintext code for delivery; only its hash is stored.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn generate(&self, user_id: &UserId) -> Result<String> {
        let code = generate_code();
        let code_hash = hashing::hash_secret(&self.argon2, &code)?;
        let expires_at = Utc::now() + self.ttl;

        self.challenge_repository
            .replace(NewOtpChallenge { user_id: user_id.clone(), code_hash, expires_at })
            .await?;

        self.audit_repository
            .record_auth_event(
                AuditEvent::auth(
                    "auth.otp.challenge_created",
                    Some(user_id.as_str()),
                    None,
                    json!({ "expires_at": expires_at }),
                )
                .with_user(Some(user_id.to_string())),
            )
            .await?;

        metrics::record_otp_challenge("created").await;
        info!(user_id = %user_id, "OTP challenge created");

        Ok(code)
    }

    /// Verify a submitted code against the user's active challenge. The
    /// challenge is destroyed on success, on expiry, and when the attempt
    /// budget is exhausted.
    #[instrument(skip(self, submitted_code), fields(user_id = %user_id))]
    pub async fn verify(&self, user_id: &UserId, submitted_code: &str) -> Result<()> {
        let Some(challenge) = self.challenge_repository.get(user_id).await? else {
            metrics::record_otp_challenge("no_active_challenge").await;
            return Err(Error::auth(
                "No active OTP challenge for user",
                AuthErrorType::NoActiveChallenge,
            ));
        };

        if challenge.is_expired(Utc::now()) {
            self.challenge_repository.delete(user_id).await?;
            metrics::record_otp_challenge("expired").await;
            return Err(Error::auth("OTP challenge has expired", AuthErrorType::OtpExpired));
        }

        if !hashing::verify_secret(&self.argon2, &challenge.code_hash, submitted_code)? {
            let attempts = self.challenge_repository.increment_attempts(user_id).await?;

            // The challenge may have been consumed or replaced between the
            // read and the increment; treat that as no active challenge.
            let Some(attempts) = attempts else {
                metrics::record_otp_challenge("no_active_challenge").await;
                return Err(Error::auth(
                    "No active OTP challenge for user",
                    AuthErrorType::NoActiveChallenge,
                ));
            };

            if attempts >= self.max_attempts {
                self.challenge_repository.delete(user_id).await?;
                self.audit_repository
                    .record_auth_event(
                        AuditEvent::auth(
                            "auth.otp.attempts_exhausted",
                            Some(user_id.as_str()),
                            None,
                            json!({ "attempts": attempts }),
                        )
                        .with_user(Some(user_id.to_string())),
                    )
                    .await?;
                metrics::record_otp_challenge("attempts_exhausted").await;
                warn!(user_id = %user_id, attempts, "OTP attempt budget exhausted, challenge destroyed");
                return Err(Error::auth(
                    "Too many invalid OTP attempts",
                    AuthErrorType::OtpAttemptsExhausted,
                ));
            }

            metrics::record_otp_challenge("invalid").await;
            return Err(Error::auth("Invalid OTP code", AuthErrorType::OtpInvalid));
        }

        self.challenge_repository.delete(user_id).await?;
        self.audit_repository
            .record_auth_event(
                AuditEvent::auth("auth.otp.verified", Some(user_id.as_str()), None, json!({}))
                    .with_user(Some(user_id.to_string())),
            )
            .await?;

        metrics::record_otp_challenge("verified").await;
        info!(user_id = %user_id, "OTP challenge verified");

        Ok(())
    }
}

/// 6-digit numeric code drawn from OS randomness.
fn generate_code() -> String {
    let value: u32 = OsRng.gen_range(0..1_000_000);
    format!("{:06}", value)
}
