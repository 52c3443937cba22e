// Library exports for the Rafah backend
// This file exposes modules and functions for library consumers

pub mod app;
pub mod app_config;
pub mod config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod schema;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use app::AppState;
pub use app_config::{AppConfig, SecuritySettings, CONFIG};
pub use db::{DieselDatabaseConfig, DieselPool};
pub use handlers::build_router;
pub use middleware::auth_middleware;
pub use middleware::AuthenticatedUser;
pub use services::{
    AnalyticsEngine, AuditLogger, JwtError, JwtService, LinkService, SecurityManager,
};
pub use utils::ServiceError;

use std::sync::Arc;
use tracing::info;

/// Initialize application state: config, database pool, migrations and
/// the shared services.
pub async fn initialize_app_state() -> Result<AppState, Box<dyn std::error::Error>> {
    // Load environment
    dotenv::dotenv().ok();

    let config = app_config::config();

    info!(
        "Initializing database pool for {}",
        db::mask_connection_string(&config.database_url)
    );
    let db_config = db::DieselDatabaseConfig::default();
    let diesel_pool = db::create_diesel_pool(db_config).await?;

    if migrations::should_run_migrations() {
        info!("Running embedded migrations...");
        migrations::run_migrations()
            .await
            .map_err(|e| format!("Migration failed: {}", e))?;
    }

    let jwt_service = Arc::new(JwtService::from_config(config));
    let security_manager = Arc::new(SecurityManager::new(config.security.clone()));
    let audit_logger = Arc::new(AuditLogger::new(diesel_pool.clone()));

    Ok(AppState {
        config: Arc::new(config.clone()),
        diesel_pool,
        jwt_service,
        security_manager,
        audit_logger,
    })
}
