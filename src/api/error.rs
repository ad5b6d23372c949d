use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::json;

use crate::errors::{AuthErrorType, Error};

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Conflict(String),
    NotFound(String),
    Unauthorized { error: &'static str, message: String },
    /// Denied an otherwise-authenticated caller. Carries the distinct
    /// `{success:false, error, statusCode:403}` body shape.
    Forbidden { error: &'static str, message: String },
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        match self {
            ApiError::Forbidden { error, message } => {
                // Distinct body so clients can tell a privilege denial apart
                // from a bad credential.
                let body = json!({
                    "success": false,
                    "error": error,
                    "message": message,
                    "statusCode": 403,
                });
                (status, Json(body)).into_response()
            }
            ApiError::Unauthorized { error, message } => {
                (status, Json(ErrorBody { error, message })).into_response()
            }
            other => {
                let error_kind = match other {
                    ApiError::BadRequest(_) => "bad_request",
                    ApiError::Conflict(_) => "conflict",
                    ApiError::NotFound(_) => "not_found",
                    ApiError::ServiceUnavailable(_) => "service_unavailable",
                    _ => "internal_error",
                };
                let message = match other {
                    ApiError::BadRequest(msg)
                    | ApiError::Conflict(msg)
                    | ApiError::NotFound(msg)
                    | ApiError::ServiceUnavailable(msg)
                    | ApiError::Internal(msg) => msg,
                    _ => String::new(),
                };
                (status, Json(ErrorBody { error: error_kind, message })).into_response()
            }
        }
    }
}

impl ApiError {
    pub fn unauthorized<S: Into<String>>(msg: S) -> Self {
        ApiError::Unauthorized { error: "unauthorized", message: msg.into() }
    }

    /// Map an auth error subtype to its HTTP shape. Forbidden subtypes keep
    /// their specific code; credential rejections stay generic to avoid user
    /// enumeration.
    pub fn from_auth(error_type: AuthErrorType, message: String) -> Self {
        if error_type.is_forbidden() {
            ApiError::Forbidden { error: error_type.as_str(), message }
        } else {
            match error_type {
                // Never reveal whether the account exists or is disabled.
                AuthErrorType::InvalidCredentials | AuthErrorType::AccountInactive => {
                    ApiError::Unauthorized {
                        error: "invalid_credentials",
                        message: "Invalid email or password".to_string(),
                    }
                }
                other => ApiError::Unauthorized { error: other.as_str(), message },
            }
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(msg) => ApiError::BadRequest(msg),
            Error::NotFound { resource_type, id } => {
                ApiError::NotFound(format!("{} '{}' not found", resource_type, id))
            }
            Error::Conflict(msg) => ApiError::Conflict(msg),
            Error::Auth { message, error_type } => ApiError::from_auth(error_type, message),
            Error::Database { source, context } => {
                if let Some(db_err) = source.as_database_error() {
                    if db_err.is_unique_violation() {
                        return ApiError::Conflict(context);
                    }
                }
                ApiError::Internal(context)
            }
            Error::Config(msg) | Error::Internal(msg) => ApiError::Internal(msg),
            Error::Io(err) => ApiError::Internal(err.to_string()),
        }
    }
}
