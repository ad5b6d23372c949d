//! JWT access token issuance and verification.
//!
//! Access tokens are short-lived HS256 JWTs carrying a snapshot of the user's
//! identity, role names, and resource:action permissions at issue time. The
//! snapshot is never trusted for authorization beyond its own lifetime.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::permissions;
use crate::auth::role::Role;
use crate::auth::user::User;
use crate::errors::{AuthErrorType, Error, Result};

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: the user id
    pub sub: String,
    pub email: String,
    pub email_verified: bool,
    /// Role names at issue time
    pub roles: Vec<String>,
    /// `resource:action` permission snapshot at issue time
    pub permissions: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies signed access tokens.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtService {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation: Validation::default(),
            ttl,
        }
    }

    /// Seconds until a freshly issued token expires.
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Sign an access token for a user with their current roles.
    pub fn issue(&self, user: &User, roles: &[Role]) -> Result<String> {
        let now = Utc::now();
        let role_names: Vec<String> = roles.iter().map(|r| r.name.clone()).collect();
        let permission_keys: Vec<String> = permissions::effective_permissions(roles)
            .into_iter()
            .map(|(resource, action)| format!("{}:{}", resource, action))
            .collect();

        let claims = AccessClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            email_verified: user.email_verified,
            roles: role_names,
            permissions: permission_keys,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| Error::internal(format!("Failed to sign access token: {}", err)))
    }

    /// Verify signature and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> Result<AccessClaims> {
        decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    Error::auth("Access token has expired", AuthErrorType::InvalidCredentials)
                }
                _ => Error::auth("Invalid access token", AuthErrorType::InvalidCredentials),
            })
    }
}
