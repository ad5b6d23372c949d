use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::auth::{
    guard::RouteRequirement,
    middleware::{authenticate, require},
    Authenticator, LoginService, TokenService, UserService,
};
use crate::observability::HealthChecker;
use crate::storage::repositories::{AuditLogRepository, PermissionRepository, RoleRepository};
use crate::storage::DbPool;

use super::{
    docs,
    handlers::{
        change_password_handler, create_permission_handler, create_role_handler,
        create_user_handler, delete_permission_handler, delete_role_handler, delete_user_handler,
        get_role_handler, get_user_handler, health_handler, list_permissions_handler,
        list_roles_handler, list_users_handler, login_handler, logout_handler, me_handler,
        readiness_handler, refresh_handler, set_role_permissions_handler, set_user_roles_handler,
        update_role_handler, update_user_handler, verify_otp_handler,
    },
};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub pool: DbPool,
    pub login_service: Arc<LoginService>,
    pub token_service: Arc<TokenService>,
    pub user_service: Arc<UserService>,
    pub role_repository: Arc<dyn RoleRepository>,
    pub permission_repository: Arc<dyn PermissionRepository>,
    pub audit_repository: Arc<AuditLogRepository>,
    pub authenticator: Arc<Authenticator>,
    pub health_checker: Arc<HealthChecker>,
}

pub fn build_router(state: ApiState) -> Router {
    let auth_layer = middleware::from_fn_with_state(state.authenticator.clone(), authenticate);

    let require_layer = |requirement: RouteRequirement| {
        middleware::from_fn_with_state(Arc::new(requirement), require)
    };

    // Login, OTP completion, refresh, and logout operate before (or without)
    // a bearer token, so they sit outside the authentication layer.
    let public_api = Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(readiness_handler))
        .route("/api/v1/auth/login", post(login_handler))
        .route("/api/v1/auth/otp/verify", post(verify_otp_handler))
        .route("/api/v1/auth/refresh", post(refresh_handler))
        .route("/api/v1/auth/logout", post(logout_handler))
        .with_state(state.clone());

    let secured_api = Router::new()
        .merge(
            Router::new()
                .route("/api/v1/auth/me", get(me_handler))
                .route_layer(require_layer(RouteRequirement::authenticated())),
        )
        .merge(
            Router::new()
                .route("/api/v1/users/{id}/password", put(change_password_handler))
                .route_layer(require_layer(RouteRequirement::authenticated())),
        )
        .merge(
            Router::new()
                .route("/api/v1/users", get(list_users_handler))
                .route("/api/v1/users/{id}", get(get_user_handler))
                .route_layer(require_layer(RouteRequirement::permission("users", "read"))),
        )
        .merge(
            Router::new()
                .route("/api/v1/users", post(create_user_handler))
                .route("/api/v1/users/{id}", put(update_user_handler))
                .route_layer(require_layer(RouteRequirement::permission("users", "write"))),
        )
        .merge(
            Router::new()
                .route("/api/v1/users/{id}", delete(delete_user_handler))
                .route_layer(require_layer(RouteRequirement::admin())),
        )
        .merge(
            Router::new()
                .route("/api/v1/users/{id}/roles", put(set_user_roles_handler))
                .route_layer(require_layer(RouteRequirement::admin())),
        )
        .merge(
            Router::new()
                .route("/api/v1/roles", get(list_roles_handler))
                .route("/api/v1/roles/{id}", get(get_role_handler))
                .route_layer(require_layer(RouteRequirement::permission("roles", "read"))),
        )
        .merge(
            Router::new()
                .route("/api/v1/roles", post(create_role_handler))
                .route("/api/v1/roles/{id}", put(update_role_handler))
                .route("/api/v1/roles/{id}", delete(delete_role_handler))
                .route("/api/v1/roles/{id}/permissions", put(set_role_permissions_handler))
                .route_layer(require_layer(RouteRequirement::admin())),
        )
        .merge(
            Router::new()
                .route("/api/v1/permissions", get(list_permissions_handler))
                .route_layer(require_layer(RouteRequirement::permission("roles", "read"))),
        )
        .merge(
            Router::new()
                .route("/api/v1/permissions", post(create_permission_handler))
                .route("/api/v1/permissions/{id}", delete(delete_permission_handler))
                .route_layer(require_layer(RouteRequirement::admin())),
        )
        .with_state(state)
        .layer(auth_layer);

    public_api.merge(secured_api).merge(docs::docs_router())
}
