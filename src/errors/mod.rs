//! # Error Handling
//!
//! Error types for the keyplane identity plane using `thiserror`.

use std::fmt;

/// Custom result type for keyplane operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the keyplane identity plane
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database and storage errors
    #[error("Database error: {context}")]
    Database {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Authentication and authorization errors
    #[error("Authentication error: {message}")]
    Auth { message: String, error_type: AuthErrorType },

    /// Resource not found errors
    #[error("Resource not found: {resource_type} with ID '{id}'")]
    NotFound { resource_type: String, id: String },

    /// Resource conflict errors (e.g., already exists)
    #[error("Resource conflict: {0}")]
    Conflict(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Authentication error subtypes surfaced to callers as specific codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorType {
    InvalidCredentials,
    AccountInactive,
    EmailNotVerified,
    OtpRequired,
    OtpInvalid,
    OtpExpired,
    OtpAttemptsExhausted,
    NoActiveChallenge,
    RefreshTokenInvalid,
    RefreshTokenExpired,
    RefreshTokenReused,
    PermissionDenied,
    AdminRequired,
    AdminRevoked,
    SensitiveRequiresOtp,
}

impl AuthErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthErrorType::InvalidCredentials => "invalid_credentials",
            AuthErrorType::AccountInactive => "account_inactive",
            AuthErrorType::EmailNotVerified => "email_not_verified",
            AuthErrorType::OtpRequired => "otp_required",
            AuthErrorType::OtpInvalid => "otp_invalid",
            AuthErrorType::OtpExpired => "otp_expired",
            AuthErrorType::OtpAttemptsExhausted => "otp_attempts_exhausted",
            AuthErrorType::NoActiveChallenge => "no_active_challenge",
            AuthErrorType::RefreshTokenInvalid => "refresh_token_invalid",
            AuthErrorType::RefreshTokenExpired => "refresh_token_expired",
            AuthErrorType::RefreshTokenReused => "refresh_token_reused",
            AuthErrorType::PermissionDenied => "permission_denied",
            AuthErrorType::AdminRequired => "admin_required",
            AuthErrorType::AdminRevoked => "admin_revoked",
            AuthErrorType::SensitiveRequiresOtp => "sensitive_requires_otp",
        }
    }

    /// Whether this subtype denies an otherwise-authenticated caller (403)
    /// rather than rejecting the credential itself (401).
    pub fn is_forbidden(&self) -> bool {
        matches!(
            self,
            AuthErrorType::PermissionDenied
                | AuthErrorType::AdminRequired
                | AuthErrorType::AdminRevoked
                | AuthErrorType::SensitiveRequiresOtp
        )
    }
}

impl fmt::Display for AuthErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a database error with context
    pub fn database<S: Into<String>>(source: sqlx::Error, context: S) -> Self {
        Self::Database { source, context: context.into() }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create an authentication error
    pub fn auth<S: Into<String>>(message: S, error_type: AuthErrorType) -> Self {
        Self::Auth { message: message.into(), error_type }
    }

    /// Create an internal server error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource_type: R, id: I) -> Self {
        Self::NotFound { resource_type: resource_type.into(), id: id.into() }
    }

    /// Create a conflict error
    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::Conflict(message.into())
    }

    /// Auth error subtype, if this is an authentication error.
    pub fn auth_error_type(&self) -> Option<AuthErrorType> {
        match self {
            Error::Auth { error_type, .. } => Some(*error_type),
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        Error::Validation(errors.to_string())
    }
}
