use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::auth::{
    Authenticator, JwtService, LoginService, OtpService, TokenService, UserService,
};
use crate::config::AppConfig;
use crate::errors::Error;
use crate::observability::HealthChecker;
use crate::storage::repositories::{
    AuditLogRepository, SqlxOtpChallengeRepository, SqlxPermissionRepository,
    SqlxRefreshTokenRepository, SqlxRoleRepository, SqlxUserRepository,
};
use crate::storage::DbPool;

use super::routes::{build_router, ApiState};

/// Wire repositories and services into the shared API state.
pub fn build_state(config: &AppConfig, pool: DbPool) -> ApiState {
    let user_repository = Arc::new(SqlxUserRepository::new(pool.clone()));
    let role_repository = Arc::new(SqlxRoleRepository::new(pool.clone()));
    let permission_repository = Arc::new(SqlxPermissionRepository::new(pool.clone()));
    let refresh_repository = Arc::new(SqlxRefreshTokenRepository::new(pool.clone()));
    let otp_repository = Arc::new(SqlxOtpChallengeRepository::new(pool.clone()));
    let audit_repository = Arc::new(AuditLogRepository::new(pool.clone()));

    let jwt = JwtService::new(config.auth.jwt_secret.as_bytes(), config.auth.access_token_ttl());

    let token_service = Arc::new(TokenService::new(
        refresh_repository.clone(),
        user_repository.clone(),
        role_repository.clone(),
        audit_repository.clone(),
        jwt.clone(),
        config.auth.refresh_token_ttl(),
    ));
    let otp_service = Arc::new(OtpService::new(
        otp_repository,
        audit_repository.clone(),
        config.auth.otp_ttl(),
        config.auth.otp_max_attempts,
    ));
    let login_service = Arc::new(LoginService::new(
        user_repository.clone(),
        role_repository.clone(),
        audit_repository.clone(),
        otp_service,
        token_service.clone(),
    ));
    let user_service = Arc::new(UserService::new(
        user_repository.clone(),
        role_repository.clone(),
        refresh_repository,
        audit_repository.clone(),
    ));
    let authenticator = Arc::new(Authenticator::new(jwt, user_repository, role_repository.clone()));

    ApiState {
        pool,
        login_service,
        token_service,
        user_service,
        role_repository,
        permission_repository,
        audit_repository,
        authenticator,
        health_checker: Arc::new(HealthChecker::new()),
    }
}

pub async fn start_api_server(config: &AppConfig, pool: DbPool) -> crate::Result<()> {
    let addr: SocketAddr = config
        .server
        .bind_address()
        .parse()
        .map_err(|e| Error::config(format!("Invalid API address: {}", e)))?;

    let state = build_state(config, pool);
    let mut router: Router = build_router(state);

    if config.server.enable_cors {
        warn!("permissive CORS enabled, do not use in production");
        router = router.layer(CorsLayer::permissive());
    }

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::internal(format!("Failed to bind API server: {}", e)))?;

    info!(address = %addr, "Starting HTTP API server");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "API server shutdown listener failed");
            }
        })
        .await
        .map_err(|e| Error::internal(format!("API server error: {}", e)))?;

    info!("API server shutdown completed");
    Ok(())
}
