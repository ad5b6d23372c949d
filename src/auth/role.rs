//! Role and permission domain models.
//!
//! Roles are shared across users (many-to-many) and own a set of
//! permissions. A permission is identified by its (resource, action)
//! pair, which is unique system-wide.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::domain::{PermissionId, RoleId};

/// Name of the role that grants access to admin-scoped routes. The role
/// marked `is_default` is assigned to every newly created user.
pub const ADMIN_ROLE_NAME: &str = "admin";

/// An atomic capability: an action on a resource, e.g. `post:update`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: PermissionId,
    pub resource: String,
    pub action: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Permission {
    /// Identity of a permission is its (resource, action) pair.
    pub fn key(&self) -> (&str, &str) {
        (self.resource.as_str(), self.action.as_str())
    }
}

/// A named grouping of permissions assignable to users.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
    pub is_default: bool,
    pub permissions: Vec<Permission>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn is_admin_role(&self) -> bool {
        self.name == ADMIN_ROLE_NAME
    }
}

/// New role creation payload.
#[derive(Debug, Clone)]
pub struct NewRole {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
    pub is_default: bool,
}

/// New permission creation payload.
#[derive(Debug, Clone)]
pub struct NewPermission {
    pub id: PermissionId,
    pub resource: String,
    pub action: String,
    pub description: Option<String>,
}

/// Request to create a new role.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub permission_ids: Vec<PermissionId>,
}

/// Request to update an existing role.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    #[validate(length(min = 1, max = 64))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_default: Option<bool>,
}

/// Request to create a new permission.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePermissionRequest {
    #[validate(length(min = 1, max = 64))]
    pub resource: String,
    #[validate(length(min = 1, max = 64))]
    pub action: String,
    pub description: Option<String>,
}

/// Request to replace the permission set of a role.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetRolePermissionsRequest {
    pub permission_ids: Vec<PermissionId>,
}

/// Request to replace the role set of a user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetUserRolesRequest {
    pub role_ids: Vec<RoleId>,
}
