use std::sync::Arc;

use keyplane::{
    api::start_api_server,
    auth::bootstrap::ensure_bootstrap_admin,
    observability::init_observability,
    storage::{
        create_pool,
        repositories::{
            AuditLogRepository, RoleRepository, SqlxRoleRepository, SqlxUserRepository,
            UserRepository,
        },
    },
    AppConfig, Result, APP_NAME, VERSION,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (optional - won't fail if missing)
    // This must happen before any config is read from environment
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let config = AppConfig::from_env()?;
    init_observability(&config.observability).await?;

    info!(app_name = APP_NAME, version = VERSION, "Starting Keyplane identity plane");

    info!(auto_migrate = config.database.auto_migrate, "Creating database connection pool");
    let pool = create_pool(&config.database).await?;

    let user_repository: Arc<dyn UserRepository> =
        Arc::new(SqlxUserRepository::new(pool.clone()));
    let role_repository: Arc<dyn RoleRepository> =
        Arc::new(SqlxRoleRepository::new(pool.clone()));
    let audit_repository = Arc::new(AuditLogRepository::new(pool.clone()));
    ensure_bootstrap_admin(&config.auth, &user_repository, &role_repository, &audit_repository)
        .await?;

    start_api_server(&config, pool).await
}
