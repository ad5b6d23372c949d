//! OpenAPI documentation served at `/swagger-ui` with the raw document at
//! `/api-docs/openapi.json`.

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::handlers::health::health_handler,
        crate::api::handlers::health::readiness_handler,
        crate::api::handlers::auth::login_handler,
        crate::api::handlers::auth::verify_otp_handler,
        crate::api::handlers::auth::refresh_handler,
        crate::api::handlers::auth::logout_handler,
        crate::api::handlers::auth::me_handler,
        crate::api::handlers::users::list_users_handler,
        crate::api::handlers::users::create_user_handler,
        crate::api::handlers::users::get_user_handler,
        crate::api::handlers::users::update_user_handler,
        crate::api::handlers::users::delete_user_handler,
        crate::api::handlers::users::set_user_roles_handler,
        crate::api::handlers::users::change_password_handler,
        crate::api::handlers::roles::list_roles_handler,
        crate::api::handlers::roles::create_role_handler,
        crate::api::handlers::roles::get_role_handler,
        crate::api::handlers::roles::update_role_handler,
        crate::api::handlers::roles::delete_role_handler,
        crate::api::handlers::roles::set_role_permissions_handler,
        crate::api::handlers::roles::list_permissions_handler,
        crate::api::handlers::roles::create_permission_handler,
        crate::api::handlers::roles::delete_permission_handler
    ),
    components(
        schemas(
            crate::api::handlers::health::HealthResponse,
            crate::api::handlers::auth::LoginResponse,
            crate::api::handlers::auth::VerifyOtpBody,
            crate::api::handlers::auth::RefreshBody,
            crate::api::handlers::auth::RefreshResponse,
            crate::api::handlers::auth::MeResponse,
            crate::api::handlers::users::UserListResponse,
            crate::api::handlers::users::UserDetailResponse,
            crate::auth::models::TokenPair,
            crate::auth::user::LoginRequest,
            crate::auth::user::CreateUserRequest,
            crate::auth::user::UpdateUserRequest,
            crate::auth::user::ChangePasswordRequest,
            crate::auth::user::UserResponse,
            crate::auth::role::Role,
            crate::auth::role::Permission,
            crate::auth::role::CreateRoleRequest,
            crate::auth::role::UpdateRoleRequest,
            crate::auth::role::CreatePermissionRequest,
            crate::auth::role::SetRolePermissionsRequest,
            crate::auth::role::SetUserRolesRequest
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Login, token rotation, and session management"),
        (name = "users", description = "User account administration"),
        (name = "roles", description = "Role and permission administration"),
        (name = "health", description = "Liveness and readiness probes")
    ),
    info(
        title = "Keyplane Identity API",
        description = "Admin identity plane: credential login, refresh token rotation, OTP second factor, and RBAC."
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(
                    HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build(),
                ),
            );
        }
    }
}

pub fn docs_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
