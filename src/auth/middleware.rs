//! Axum middleware for authentication and per-route authorization.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Extension, State},
    http::{header::AUTHORIZATION, Method, Request},
    middleware::Next,
    response::Response,
};
use tracing::{field, info_span, warn, Instrument};

use crate::api::error::ApiError;
use crate::auth::authenticator::Authenticator;
use crate::auth::guard::{self, Decision, RouteRequirement};
use crate::auth::models::CurrentUser;
use crate::errors::Error;

pub type AuthenticatorState = Arc<Authenticator>;

/// Middleware entry point that authenticates requests using the configured
/// [`Authenticator`] and stores the resulting [`CurrentUser`] as an extension.
pub async fn authenticate(
    State(authenticator): State<AuthenticatorState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if request.method() == Method::OPTIONS {
        return Ok(next.run(request).await);
    }

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let correlation_id = uuid::Uuid::new_v4();
    let span = info_span!(
        "auth_middleware.authenticate",
        http.method = %method,
        http.path = %path,
        auth.user_id = field::Empty,
        correlation_id = %correlation_id
    );

    async move {
        let header = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");

        match authenticator.authenticate_header(header).await {
            Ok(current) => {
                tracing::Span::current().record("auth.user_id", field::display(current.id()));
                request.extensions_mut().insert(current);
                Ok(next.run(request).await)
            }
            Err(err) => {
                warn!(%correlation_id, error = %err, "authentication failed");
                Err(map_auth_error(err))
            }
        }
    }
    .instrument(span)
    .await
}

/// Middleware entry point that enforces the route's declared [`RouteRequirement`]
/// against the authenticated caller.
pub async fn require(
    State(requirement): State<Arc<RouteRequirement>>,
    Extension(current): Extension<CurrentUser>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let correlation_id = uuid::Uuid::new_v4();
    let span = info_span!(
        "auth_middleware.require",
        http.method = %method,
        http.path = %path,
        auth.user_id = %current.id(),
        correlation_id = %correlation_id
    );

    async move {
        match guard::decide(Some(&current), &requirement) {
            Decision::Allow => Ok(next.run(request).await),
            Decision::Deny(error_type) => {
                warn!(
                    %correlation_id,
                    user_id = %current.id(),
                    denial = %error_type,
                    "authorization check failed"
                );
                Err(ApiError::from_auth(error_type, denial_message(error_type).to_string()))
            }
        }
    }
    .instrument(span)
    .await
}

fn denial_message(error_type: crate::errors::AuthErrorType) -> &'static str {
    use crate::errors::AuthErrorType;
    match error_type {
        AuthErrorType::PermissionDenied => "Missing required permission",
        AuthErrorType::AdminRequired => "Administrative privilege required",
        AuthErrorType::AdminRevoked => "Administrative privilege has been revoked",
        AuthErrorType::SensitiveRequiresOtp => {
            "Second factor must be enabled for this operation"
        }
        _ => "Authentication required",
    }
}

fn map_auth_error(err: Error) -> ApiError {
    match err {
        Error::Auth { message, error_type } => ApiError::from_auth(error_type, message),
        Error::Database { context, .. } => {
            ApiError::ServiceUnavailable(format!("auth service unavailable: {}", context))
        }
        other => ApiError::Internal(other.to_string()),
    }
}
