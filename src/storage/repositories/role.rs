//! Role and permission repositories.
//!
//! Roles carry their permission sets when loaded; `roles_for_user` is the
//! source of truth the permission resolver and admin revalidation read.

use crate::auth::role::{NewPermission, NewRole, Permission, Role};
use crate::domain::{PermissionId, RoleId, UserId};
use crate::errors::{Error, Result};
use crate::storage::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::collections::HashMap;
use tracing::instrument;

#[derive(Debug, Clone, FromRow)]
struct PermissionRow {
    pub id: String,
    pub resource: String,
    pub action: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Combined row for batch fetching roles with permissions via LEFT JOIN
#[derive(Debug, Clone, FromRow)]
struct RoleWithPermissionRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    // Permission fields (nullable because of LEFT JOIN)
    pub permission_id: Option<String>,
    pub resource: Option<String>,
    pub action: Option<String>,
    pub permission_description: Option<String>,
    pub permission_created_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Create a new role
    async fn create_role(&self, role: NewRole) -> Result<Role>;

    /// Get a role with its permissions
    async fn get_role(&self, id: &RoleId) -> Result<Option<Role>>;

    /// Get a role by its unique name
    async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>>;

    /// Get the role marked as default for new users
    async fn get_default_role(&self) -> Result<Option<Role>>;

    /// List all roles with their permissions
    async fn list_roles(&self) -> Result<Vec<Role>>;

    /// Update a role's metadata
    async fn update_role(
        &self,
        id: &RoleId,
        name: Option<String>,
        description: Option<String>,
        is_default: Option<bool>,
    ) -> Result<Role>;

    /// Delete a role (cascades user and permission assignments)
    async fn delete_role(&self, id: &RoleId) -> Result<()>;

    /// Replace the permission set of a role
    async fn set_role_permissions(
        &self,
        role_id: &RoleId,
        permission_ids: &[PermissionId],
    ) -> Result<Role>;

    /// Load a user's current roles with their permissions
    async fn roles_for_user(&self, user_id: &UserId) -> Result<Vec<Role>>;

    /// Replace the role set of a user
    async fn set_user_roles(&self, user_id: &UserId, role_ids: &[RoleId]) -> Result<()>;

    /// Assign a single role to a user, ignoring duplicates
    async fn assign_role(&self, user_id: &UserId, role_id: &RoleId) -> Result<()>;

    /// Remove a single role from a user
    async fn remove_role(&self, user_id: &UserId, role_id: &RoleId) -> Result<()>;
}

#[async_trait]
pub trait PermissionRepository: Send + Sync {
    /// Create a new permission; (resource, action) must be unique
    async fn create_permission(&self, permission: NewPermission) -> Result<Permission>;

    /// Get a permission by ID
    async fn get_permission(&self, id: &PermissionId) -> Result<Option<Permission>>;

    /// List all permissions
    async fn list_permissions(&self) -> Result<Vec<Permission>>;

    /// Delete a permission (cascades role assignments)
    async fn delete_permission(&self, id: &PermissionId) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SqlxRoleRepository {
    pool: DbPool,
}

const ROLE_WITH_PERMISSIONS_SELECT: &str = r#"
    SELECT
        r.id, r.name, r.description, r.is_default, r.created_at, r.updated_at,
        p.id AS permission_id, p.resource, p.action,
        p.description AS permission_description, p.created_at AS permission_created_at
    FROM roles r
    LEFT JOIN role_permissions rp ON r.id = rp.role_id
    LEFT JOIN permissions p ON rp.permission_id = p.id
"#;

impl SqlxRoleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Group joined rows by role id and aggregate permissions in memory.
    fn aggregate_roles(rows: Vec<RoleWithPermissionRow>) -> Vec<Role> {
        let mut order: Vec<String> = Vec::new();
        let mut role_map: HashMap<String, Role> = HashMap::new();

        for row in rows {
            if !role_map.contains_key(&row.id) {
                order.push(row.id.clone());
                role_map.insert(
                    row.id.clone(),
                    Role {
                        id: RoleId::from_string(row.id.clone()),
                        name: row.name.clone(),
                        description: row.description.clone(),
                        is_default: row.is_default,
                        permissions: Vec::new(),
                        created_at: row.created_at,
                        updated_at: row.updated_at,
                    },
                );
            }

            if let (Some(pid), Some(resource), Some(action), Some(created_at)) =
                (row.permission_id, row.resource, row.action, row.permission_created_at)
            {
                if let Some(role) = role_map.get_mut(&row.id) {
                    role.permissions.push(Permission {
                        id: PermissionId::from_string(pid),
                        resource,
                        action,
                        description: row.permission_description,
                        created_at,
                    });
                }
            }
        }

        order.into_iter().filter_map(|id| role_map.remove(&id)).collect()
    }

    async fn fetch_roles_where(&self, clause: &str, bind: Option<String>) -> Result<Vec<Role>> {
        let sql = format!("{} {} ORDER BY r.name, p.resource, p.action", ROLE_WITH_PERMISSIONS_SELECT, clause);
        let query = sqlx::query_as::<_, RoleWithPermissionRow>(&sql);
        let query = match &bind {
            Some(value) => query.bind(value.clone()),
            None => query,
        };

        let rows = query.fetch_all(&self.pool).await.map_err(|err| Error::Database {
            source: err,
            context: "Failed to fetch roles with permissions".to_string(),
        })?;

        Ok(Self::aggregate_roles(rows))
    }
}

#[async_trait]
impl RoleRepository for SqlxRoleRepository {
    #[instrument(skip(self, role), fields(role_name = %role.name), name = "db_create_role")]
    async fn create_role(&self, role: NewRole) -> Result<Role> {
        sqlx::query(
            r#"
            INSERT INTO roles (id, name, description, is_default, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(role.id.as_str())
        .bind(&role.name)
        .bind(role.description.as_ref())
        .bind(role.is_default)
        .bind(Utc::now())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Error::conflict(format!("Role '{}' already exists", role.name))
            }
            _ => Error::Database { source: err, context: "Failed to create role".to_string() },
        })?;

        self.get_role(&role.id)
            .await?
            .ok_or_else(|| Error::internal("Role not found after creation"))
    }

    #[instrument(skip(self), fields(role_id = %id), name = "db_get_role")]
    async fn get_role(&self, id: &RoleId) -> Result<Option<Role>> {
        let roles = self.fetch_roles_where("WHERE r.id = $1", Some(id.to_string())).await?;
        Ok(roles.into_iter().next())
    }

    #[instrument(skip(self), fields(role_name = %name), name = "db_get_role_by_name")]
    async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let roles = self.fetch_roles_where("WHERE r.name = $1", Some(name.to_string())).await?;
        Ok(roles.into_iter().next())
    }

    #[instrument(skip(self), name = "db_get_default_role")]
    async fn get_default_role(&self) -> Result<Option<Role>> {
        let roles = self.fetch_roles_where("WHERE r.is_default = 1", None).await?;
        Ok(roles.into_iter().next())
    }

    #[instrument(skip(self), name = "db_list_roles")]
    async fn list_roles(&self) -> Result<Vec<Role>> {
        self.fetch_roles_where("", None).await
    }

    #[instrument(skip(self, name, description), fields(role_id = %id), name = "db_update_role")]
    async fn update_role(
        &self,
        id: &RoleId,
        name: Option<String>,
        description: Option<String>,
        is_default: Option<bool>,
    ) -> Result<Role> {
        let current =
            self.get_role(id).await?.ok_or_else(|| Error::not_found("Role", id.to_string()))?;

        let name = name.unwrap_or(current.name);
        let description = description.or(current.description);
        let is_default = is_default.unwrap_or(current.is_default);

        sqlx::query(
            "UPDATE roles SET name = $1, description = $2, is_default = $3, updated_at = $4 WHERE id = $5",
        )
        .bind(&name)
        .bind(description.as_ref())
        .bind(is_default)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|err| Error::Database {
            source: err,
            context: "Failed to update role".to_string(),
        })?;

        self.get_role(id).await?.ok_or_else(|| Error::internal("Role not found after update"))
    }

    #[instrument(skip(self), fields(role_id = %id), name = "db_delete_role")]
    async fn delete_role(&self, id: &RoleId) -> Result<()> {
        sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|err| Error::Database {
                source: err,
                context: "Failed to delete role".to_string(),
            })?;

        Ok(())
    }

    #[instrument(skip(self, permission_ids), fields(role_id = %role_id), name = "db_set_role_permissions")]
    async fn set_role_permissions(
        &self,
        role_id: &RoleId,
        permission_ids: &[PermissionId],
    ) -> Result<Role> {
        let mut tx = self.pool.begin().await.map_err(|err| Error::Database {
            source: err,
            context: "Failed to begin transaction for role permissions".to_string(),
        })?;

        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(role_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|err| Error::Database {
                source: err,
                context: "Failed to clear role permissions".to_string(),
            })?;

        for permission_id in permission_ids {
            sqlx::query(
                "INSERT INTO role_permissions (role_id, permission_id, created_at) VALUES ($1, $2, $3)",
            )
            .bind(role_id.to_string())
            .bind(permission_id.to_string())
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(|err| Error::Database {
                source: err,
                context: "Failed to assign permission to role".to_string(),
            })?;
        }

        tx.commit().await.map_err(|err| Error::Database {
            source: err,
            context: "Failed to commit role permissions".to_string(),
        })?;

        self.get_role(role_id)
            .await?
            .ok_or_else(|| Error::not_found("Role", role_id.to_string()))
    }

    #[instrument(skip(self), fields(user_id = %user_id), name = "db_roles_for_user")]
    async fn roles_for_user(&self, user_id: &UserId) -> Result<Vec<Role>> {
        let sql = format!(
            "{} WHERE r.id IN (SELECT role_id FROM user_roles WHERE user_id = $1) ORDER BY r.name, p.resource, p.action",
            ROLE_WITH_PERMISSIONS_SELECT
        );

        let rows = sqlx::query_as::<_, RoleWithPermissionRow>(&sql)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|err| Error::Database {
                source: err,
                context: "Failed to fetch roles for user".to_string(),
            })?;

        Ok(Self::aggregate_roles(rows))
    }

    #[instrument(skip(self, role_ids), fields(user_id = %user_id), name = "db_set_user_roles")]
    async fn set_user_roles(&self, user_id: &UserId, role_ids: &[RoleId]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|err| Error::Database {
            source: err,
            context: "Failed to begin transaction for user roles".to_string(),
        })?;

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|err| Error::Database {
                source: err,
                context: "Failed to clear user roles".to_string(),
            })?;

        for role_id in role_ids {
            sqlx::query("INSERT INTO user_roles (user_id, role_id, created_at) VALUES ($1, $2, $3)")
                .bind(user_id.to_string())
                .bind(role_id.to_string())
                .bind(Utc::now())
                .execute(&mut *tx)
                .await
                .map_err(|err| Error::Database {
                    source: err,
                    context: "Failed to assign role to user".to_string(),
                })?;
        }

        tx.commit().await.map_err(|err| Error::Database {
            source: err,
            context: "Failed to commit user roles".to_string(),
        })?;

        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id, role_id = %role_id), name = "db_assign_role")]
    async fn assign_role(&self, user_id: &UserId, role_id: &RoleId) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO user_roles (user_id, role_id, created_at) VALUES ($1, $2, $3)",
        )
        .bind(user_id.to_string())
        .bind(role_id.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|err| Error::Database {
            source: err,
            context: "Failed to assign role".to_string(),
        })?;

        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id, role_id = %role_id), name = "db_remove_role")]
    async fn remove_role(&self, user_id: &UserId, role_id: &RoleId) -> Result<()> {
        sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id.to_string())
            .bind(role_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|err| Error::Database {
                source: err,
                context: "Failed to remove role".to_string(),
            })?;

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SqlxPermissionRepository {
    pool: DbPool,
}

impl SqlxPermissionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn row_to_permission(row: PermissionRow) -> Permission {
        Permission {
            id: PermissionId::from_string(row.id),
            resource: row.resource,
            action: row.action,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl PermissionRepository for SqlxPermissionRepository {
    #[instrument(skip(self, permission), fields(resource = %permission.resource, action = %permission.action), name = "db_create_permission")]
    async fn create_permission(&self, permission: NewPermission) -> Result<Permission> {
        sqlx::query(
            "INSERT INTO permissions (id, resource, action, description, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(permission.id.as_str())
        .bind(&permission.resource)
        .bind(&permission.action)
        .bind(permission.description.as_ref())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => Error::conflict(
                format!("Permission '{}:{}' already exists", permission.resource, permission.action),
            ),
            _ => Error::Database {
                source: err,
                context: "Failed to create permission".to_string(),
            },
        })?;

        self.get_permission(&permission.id)
            .await?
            .ok_or_else(|| Error::internal("Permission not found after creation"))
    }

    #[instrument(skip(self), fields(permission_id = %id), name = "db_get_permission")]
    async fn get_permission(&self, id: &PermissionId) -> Result<Option<Permission>> {
        let row = sqlx::query_as::<_, PermissionRow>(
            "SELECT id, resource, action, description, created_at FROM permissions WHERE id = $1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| Error::Database {
            source: err,
            context: "Failed to fetch permission".to_string(),
        })?;

        Ok(row.map(Self::row_to_permission))
    }

    #[instrument(skip(self), name = "db_list_permissions")]
    async fn list_permissions(&self) -> Result<Vec<Permission>> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            "SELECT id, resource, action, description, created_at FROM permissions ORDER BY resource, action",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|err| Error::Database {
            source: err,
            context: "Failed to list permissions".to_string(),
        })?;

        Ok(rows.into_iter().map(Self::row_to_permission).collect())
    }

    #[instrument(skip(self), fields(permission_id = %id), name = "db_delete_permission")]
    async fn delete_permission(&self, id: &PermissionId) -> Result<()> {
        sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|err| Error::Database {
                source: err,
                context: "Failed to delete permission".to_string(),
            })?;

        Ok(())
    }
}
