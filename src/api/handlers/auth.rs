//! Session lifecycle endpoints: login, OTP completion, refresh, and logout.

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::api::error::ApiError;
use crate::api::routes::ApiState;
use crate::auth::models::{CurrentUser, LoginOutcome, TokenPair};
use crate::auth::user::{LoginRequest, UserResponse};
use crate::domain::UserId;
use crate::errors::Error;

/// Login response body. Exactly one of the outcome shapes is populated.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum LoginResponse {
    Authenticated {
        #[serde(flatten)]
        tokens: TokenPair,
        user: UserResponse,
    },
    OtpRequired {
        requires_otp: bool,
        user_id: UserId,
    },
    EmailVerificationRequired {
        requires_email_verification: bool,
        email: String,
    },
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpBody {
    pub user_id: UserId,
    #[validate(length(min = 6, max = 6))]
    pub code: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshBody {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: UserResponse,
}

fn outcome_to_response(outcome: LoginOutcome) -> Result<LoginResponse, ApiError> {
    match outcome {
        LoginOutcome::Authenticated { tokens, user } => {
            Ok(LoginResponse::Authenticated { tokens, user })
        }
        LoginOutcome::OtpRequired { user_id } => {
            Ok(LoginResponse::OtpRequired { requires_otp: true, user_id })
        }
        LoginOutcome::EmailVerificationRequired { email } => {
            Ok(LoginResponse::EmailVerificationRequired {
                requires_email_verification: true,
                email,
            })
        }
        LoginOutcome::Denied(reason) => {
            Err(ApiError::from_auth(reason.error_type(), "Login denied".to_string()))
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials accepted, see body for next step", body = LoginResponse),
        (status = 401, description = "Invalid credentials or inactive account")
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(state): State<ApiState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    payload.validate().map_err(|err| ApiError::from(Error::from(err)))?;
    let outcome = state.login_service.login(&payload).await?;
    outcome_to_response(outcome).map(Json)
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/otp/verify",
    request_body = VerifyOtpBody,
    responses(
        (status = 200, description = "Code accepted, tokens issued", body = LoginResponse),
        (status = 401, description = "Invalid, expired, or exhausted challenge")
    ),
    tag = "auth"
)]
pub async fn verify_otp_handler(
    State(state): State<ApiState>,
    Json(payload): Json<VerifyOtpBody>,
) -> Result<Json<LoginResponse>, ApiError> {
    payload.validate().map_err(|err| ApiError::from(Error::from(err)))?;
    let outcome =
        state.login_service.complete_otp_login(&payload.user_id, &payload.code).await?;
    outcome_to_response(outcome).map(Json)
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    request_body = RefreshBody,
    responses(
        (status = 200, description = "Rotated token pair", body = RefreshResponse),
        (status = 401, description = "Invalid, expired, or reused refresh token"),
        (status = 403, description = "Admin privilege revoked since issuance")
    ),
    tag = "auth"
)]
pub async fn refresh_handler(
    State(state): State<ApiState>,
    Json(payload): Json<RefreshBody>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let (tokens, user) = state.token_service.refresh(&payload.refresh_token).await?;
    Ok(Json(RefreshResponse { tokens, user }))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    request_body = RefreshBody,
    responses(
        (status = 204, description = "Session revoked (idempotent)")
    ),
    tag = "auth"
)]
pub async fn logout_handler(
    State(state): State<ApiState>,
    Json(payload): Json<RefreshBody>,
) -> Result<StatusCode, ApiError> {
    state.token_service.revoke(&payload.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "The authenticated caller", body = MeResponse),
        (status = 401, description = "Missing or invalid bearer token")
    ),
    security(("bearerAuth" = [])),
    tag = "auth"
)]
pub async fn me_handler(
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<MeResponse>, ApiError> {
    let mut permissions: Vec<String> = crate::auth::permissions::effective_permissions(
        &current.roles,
    )
    .into_iter()
    .map(|(resource, action)| format!("{}:{}", resource, action))
    .collect();
    permissions.sort();

    Ok(Json(MeResponse {
        roles: current.roles.iter().map(|role| role.name.clone()).collect(),
        permissions,
        user: UserResponse::from(current.user),
    }))
}
