use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, Response},
    Router,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use keyplane::{
    api::{build_router, build_state, ApiState},
    auth::{role::ADMIN_ROLE_NAME, user::CreateUserRequest, JwtService, OtpService, TokenService},
    config::{AppConfig, AuthConfig},
    domain::{PermissionId, RoleId, UserId},
    storage::{
        self,
        repositories::{
            AuditLogRepository, SqlxOtpChallengeRepository, SqlxRefreshTokenRepository,
            SqlxRoleRepository, SqlxUserRepository,
        },
        DbPool,
    },
};

pub const TEST_JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";

pub struct TestApp {
    pub pool: DbPool,
    pub state: ApiState,
    pub config: AppConfig,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        auth: AuthConfig { jwt_secret: TEST_JWT_SECRET.to_string(), ..AuthConfig::default() },
        ..AppConfig::default()
    }
}

pub async fn setup_test_app() -> TestApp {
    // Unique shared-cache name so parallel tests get isolated databases.
    let url = format!(
        "sqlite:file:keyplane_test_{}?mode=memory&cache=shared",
        uuid::Uuid::new_v4().simple()
    );
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("create sqlite pool");

    storage::run_migrations(&pool).await.expect("run migrations for tests");

    let config = test_config();
    let state = build_state(&config, pool.clone());

    TestApp { pool, state, config }
}

impl TestApp {
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Create an active, verified user and return its id.
    pub async fn create_user(&self, email: &str, password: &str) -> UserId {
        self.create_user_with(email, password, true, false).await
    }

    pub async fn create_user_with(
        &self,
        email: &str,
        password: &str,
        email_verified: bool,
        otp_enabled: bool,
    ) -> UserId {
        let user = self
            .state
            .user_service
            .create_user(CreateUserRequest {
                email: email.to_string(),
                password: password.to_string(),
                name: "Test User".to_string(),
                role_ids: vec![],
                email_verified,
                otp_enabled,
            })
            .await
            .expect("create user");
        user.id
    }

    /// Grant the admin role to a user.
    pub async fn make_admin(&self, user_id: &UserId) {
        let admin = self
            .state
            .role_repository
            .get_role_by_name(ADMIN_ROLE_NAME)
            .await
            .expect("load admin role")
            .expect("admin role seeded");
        self.state.role_repository.assign_role(user_id, &admin.id).await.expect("assign admin");
    }

    /// Create a role carrying a single resource:action permission and assign
    /// it to the user. Returns the role id.
    pub async fn grant_permission(
        &self,
        user_id: &UserId,
        role_name: &str,
        resource: &str,
        action: &str,
    ) -> RoleId {
        use keyplane::auth::role::{NewPermission, NewRole};

        let permission = self
            .state
            .permission_repository
            .create_permission(NewPermission {
                id: PermissionId::new(),
                resource: resource.to_string(),
                action: action.to_string(),
                description: None,
            })
            .await
            .expect("create permission");

        let role = self
            .state
            .role_repository
            .create_role(NewRole {
                id: RoleId::new(),
                name: role_name.to_string(),
                description: None,
                is_default: false,
            })
            .await
            .expect("create role");
        self.state
            .role_repository
            .set_role_permissions(&role.id, &[permission.id])
            .await
            .expect("set role permissions");
        self.state.role_repository.assign_role(user_id, &role.id).await.expect("assign role");
        role.id
    }

    /// Log in over HTTP and return the parsed response body.
    pub async fn login(&self, email: &str, password: &str) -> Value {
        let response = send_request(
            self,
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await;
        assert_eq!(response.status(), axum::http::StatusCode::OK, "login should succeed");
        read_json(response).await
    }

    /// An OTP service sharing this app's database, with a configurable TTL.
    /// Used to plant challenges with a known plaintext code.
    pub fn otp_service(&self, ttl: chrono::Duration, max_attempts: i64) -> OtpService {
        OtpService::new(
            Arc::new(SqlxOtpChallengeRepository::new(self.pool.clone())),
            Arc::new(AuditLogRepository::new(self.pool.clone())),
            ttl,
            max_attempts,
        )
    }

    /// A token service sharing this app's database, with a configurable
    /// refresh TTL. Used to mint already-expired refresh tokens.
    pub fn token_service(&self, refresh_ttl: chrono::Duration) -> TokenService {
        let jwt =
            JwtService::new(TEST_JWT_SECRET.as_bytes(), self.config.auth.access_token_ttl());
        TokenService::new(
            Arc::new(SqlxRefreshTokenRepository::new(self.pool.clone())),
            Arc::new(SqlxUserRepository::new(self.pool.clone())),
            Arc::new(SqlxRoleRepository::new(self.pool.clone())),
            Arc::new(AuditLogRepository::new(self.pool.clone())),
            jwt,
            refresh_ttl,
        )
    }
}

pub async fn send_request(
    app: &TestApp,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }

    let request = if let Some(json) = body {
        let bytes = serde_json::to_vec(&json).expect("serialize body");
        builder
            .header("content-type", "application/json")
            .body(Body::from(bytes))
            .expect("build request")
    } else {
        builder.body(Body::empty()).expect("build request")
    };

    app.router().oneshot(request).await.expect("request")
}

pub async fn read_json<T: DeserializeOwned>(response: Response<Body>) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}
