//! Role and permission management endpoints. Changes here take effect on the
//! next permission check; callers never need to log in again.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::api::error::ApiError;
use crate::api::routes::ApiState;
use crate::auth::role::{
    CreatePermissionRequest, CreateRoleRequest, NewPermission, NewRole, Permission, Role,
    SetRolePermissionsRequest, UpdateRoleRequest,
};
use crate::domain::{PermissionId, RoleId};
use crate::errors::Error;

#[utoipa::path(
    get,
    path = "/api/v1/roles",
    responses(
        (status = 200, description = "Roles with their permissions", body = [Role])
    ),
    security(("bearerAuth" = [])),
    tag = "roles"
)]
pub async fn list_roles_handler(
    State(state): State<ApiState>,
) -> Result<Json<Vec<Role>>, ApiError> {
    let roles = state.role_repository.list_roles().await?;
    Ok(Json(roles))
}

#[utoipa::path(
    post,
    path = "/api/v1/roles",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Role created", body = Role),
        (status = 409, description = "Role name already taken")
    ),
    security(("bearerAuth" = [])),
    tag = "roles"
)]
pub async fn create_role_handler(
    State(state): State<ApiState>,
    Json(payload): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<Role>), ApiError> {
    payload.validate().map_err(|err| ApiError::from(Error::from(err)))?;

    let role = state
        .role_repository
        .create_role(NewRole {
            id: RoleId::new(),
            name: payload.name,
            description: payload.description,
            is_default: payload.is_default,
        })
        .await?;

    let role = if payload.permission_ids.is_empty() {
        role
    } else {
        state.role_repository.set_role_permissions(&role.id, &payload.permission_ids).await?
    };

    Ok((StatusCode::CREATED, Json(role)))
}

#[utoipa::path(
    get,
    path = "/api/v1/roles/{id}",
    params(("id" = String, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role with its permissions", body = Role),
        (status = 404, description = "Unknown role")
    ),
    security(("bearerAuth" = [])),
    tag = "roles"
)]
pub async fn get_role_handler(
    State(state): State<ApiState>,
    Path(id): Path<RoleId>,
) -> Result<Json<Role>, ApiError> {
    let role = state
        .role_repository
        .get_role(&id)
        .await?
        .ok_or_else(|| Error::not_found("role", id.as_str()))?;
    Ok(Json(role))
}

#[utoipa::path(
    put,
    path = "/api/v1/roles/{id}",
    params(("id" = String, Path, description = "Role id")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = Role),
        (status = 404, description = "Unknown role")
    ),
    security(("bearerAuth" = [])),
    tag = "roles"
)]
pub async fn update_role_handler(
    State(state): State<ApiState>,
    Path(id): Path<RoleId>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<Json<Role>, ApiError> {
    payload.validate().map_err(|err| ApiError::from(Error::from(err)))?;

    let role = state
        .role_repository
        .update_role(&id, payload.name, payload.description, payload.is_default)
        .await?;
    Ok(Json(role))
}

#[utoipa::path(
    delete,
    path = "/api/v1/roles/{id}",
    params(("id" = String, Path, description = "Role id")),
    responses(
        (status = 204, description = "Role deleted"),
        (status = 404, description = "Unknown role")
    ),
    security(("bearerAuth" = [])),
    tag = "roles"
)]
pub async fn delete_role_handler(
    State(state): State<ApiState>,
    Path(id): Path<RoleId>,
) -> Result<StatusCode, ApiError> {
    state.role_repository.delete_role(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/api/v1/roles/{id}/permissions",
    params(("id" = String, Path, description = "Role id")),
    request_body = SetRolePermissionsRequest,
    responses(
        (status = 200, description = "Permission set replaced", body = Role),
        (status = 404, description = "Unknown role or permission")
    ),
    security(("bearerAuth" = [])),
    tag = "roles"
)]
pub async fn set_role_permissions_handler(
    State(state): State<ApiState>,
    Path(id): Path<RoleId>,
    Json(payload): Json<SetRolePermissionsRequest>,
) -> Result<Json<Role>, ApiError> {
    let role =
        state.role_repository.set_role_permissions(&id, &payload.permission_ids).await?;
    Ok(Json(role))
}

#[utoipa::path(
    get,
    path = "/api/v1/permissions",
    responses(
        (status = 200, description = "All registered permissions", body = [Permission])
    ),
    security(("bearerAuth" = [])),
    tag = "roles"
)]
pub async fn list_permissions_handler(
    State(state): State<ApiState>,
) -> Result<Json<Vec<Permission>>, ApiError> {
    let permissions = state.permission_repository.list_permissions().await?;
    Ok(Json(permissions))
}

#[utoipa::path(
    post,
    path = "/api/v1/permissions",
    request_body = CreatePermissionRequest,
    responses(
        (status = 201, description = "Permission created", body = Permission),
        (status = 409, description = "Resource/action pair already exists")
    ),
    security(("bearerAuth" = [])),
    tag = "roles"
)]
pub async fn create_permission_handler(
    State(state): State<ApiState>,
    Json(payload): Json<CreatePermissionRequest>,
) -> Result<(StatusCode, Json<Permission>), ApiError> {
    payload.validate().map_err(|err| ApiError::from(Error::from(err)))?;

    let permission = state
        .permission_repository
        .create_permission(NewPermission {
            id: PermissionId::new(),
            resource: payload.resource,
            action: payload.action,
            description: payload.description,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(permission)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/permissions/{id}",
    params(("id" = String, Path, description = "Permission id")),
    responses(
        (status = 204, description = "Permission deleted"),
        (status = 404, description = "Unknown permission")
    ),
    security(("bearerAuth" = [])),
    tag = "roles"
)]
pub async fn delete_permission_handler(
    State(state): State<ApiState>,
    Path(id): Path<PermissionId>,
) -> Result<StatusCode, ApiError> {
    state.permission_repository.delete_permission(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
