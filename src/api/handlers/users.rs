//! User account management endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::error::ApiError;
use crate::api::routes::ApiState;
use crate::auth::models::CurrentUser;
use crate::auth::permissions;
use crate::auth::role::SetUserRolesRequest;
use crate::auth::user::{
    ChangePasswordRequest, CreateUserRequest, UpdateUserRequest, UserResponse,
};
use crate::domain::UserId;
use crate::errors::AuthErrorType;

#[derive(Debug, Clone, Deserialize, Default, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserDetailResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub roles: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Users list", body = UserListResponse)
    ),
    security(("bearerAuth" = [])),
    tag = "users"
)]
pub async fn list_users_handler(
    State(state): State<ApiState>,
    Query(params): Query<ListUsersQuery>,
) -> Result<Json<UserListResponse>, ApiError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 1000);
    let offset = params.offset.unwrap_or(0).max(0);

    let (users, total) = state.user_service.list_users(limit, offset).await?;
    Ok(Json(UserListResponse {
        users: users.into_iter().map(UserResponse::from).collect(),
        total,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Email already registered")
    ),
    security(("bearerAuth" = [])),
    tag = "users"
)]
pub async fn create_user_handler(
    State(state): State<ApiState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let user = state.user_service.create_user(payload).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User detail", body = UserDetailResponse),
        (status = 404, description = "Unknown user")
    ),
    security(("bearerAuth" = [])),
    tag = "users"
)]
pub async fn get_user_handler(
    State(state): State<ApiState>,
    Path(id): Path<UserId>,
) -> Result<Json<UserDetailResponse>, ApiError> {
    let user = state.user_service.get_user(&id).await?;
    let roles = state.user_service.roles_for_user(&id).await?;
    Ok(Json(UserDetailResponse {
        user: UserResponse::from(user),
        roles: roles.into_iter().map(|role| role.name).collect(),
    }))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    params(("id" = String, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 404, description = "Unknown user")
    ),
    security(("bearerAuth" = [])),
    tag = "users"
)]
pub async fn update_user_handler(
    State(state): State<ApiState>,
    Path(id): Path<UserId>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.user_service.update_user(&id, payload).await?;
    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "Unknown user")
    ),
    security(("bearerAuth" = [])),
    tag = "users"
)]
pub async fn delete_user_handler(
    State(state): State<ApiState>,
    Path(id): Path<UserId>,
) -> Result<StatusCode, ApiError> {
    state.user_service.delete_user(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{id}/roles",
    params(("id" = String, Path, description = "User id")),
    request_body = SetUserRolesRequest,
    responses(
        (status = 200, description = "Roles replaced", body = UserDetailResponse),
        (status = 404, description = "Unknown user or role")
    ),
    security(("bearerAuth" = [])),
    tag = "users"
)]
pub async fn set_user_roles_handler(
    State(state): State<ApiState>,
    Path(id): Path<UserId>,
    Json(payload): Json<SetUserRolesRequest>,
) -> Result<Json<UserDetailResponse>, ApiError> {
    let user = state.user_service.get_user(&id).await?;
    let roles = state.user_service.set_user_roles(&id, &payload.role_ids).await?;
    Ok(Json(UserDetailResponse {
        user: UserResponse::from(user),
        roles: roles.into_iter().map(|role| role.name).collect(),
    }))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{id}/password",
    params(("id" = String, Path, description = "User id")),
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed, sessions revoked"),
        (status = 401, description = "Current password incorrect"),
        (status = 403, description = "Cannot change another user's password")
    ),
    security(("bearerAuth" = [])),
    tag = "users"
)]
pub async fn change_password_handler(
    State(state): State<ApiState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<UserId>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    // Self-service only, unless the caller is an admin.
    if current.id() != &id && !permissions::can_access_admin_features(&current.roles) {
        return Err(ApiError::from_auth(
            AuthErrorType::PermissionDenied,
            "Cannot change another user's password".to_string(),
        ));
    }

    state.user_service.change_password(&id, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}
