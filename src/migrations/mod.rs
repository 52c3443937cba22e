// Diesel migration runner for PostgreSQL
// Uses embedded migrations from diesel_migrations crate
// Note: diesel_migrations requires sync connections, not async

use crate::db::MIGRATIONS;
use diesel::Connection;
use diesel::PgConnection;
use diesel_migrations::MigrationHarness;
use std::error::Error;
use tracing::{debug, info};

/// Whether startup should apply embedded migrations
pub fn should_run_migrations() -> bool {
    !crate::app_config::config().disable_embedded_migrations
}

/// Run all pending Diesel migrations
/// Returns the number of migrations applied
pub async fn run_migrations() -> Result<usize, Box<dyn Error + Send + Sync>> {
    let database_url = crate::app_config::config().database_url.clone();

    // Run migrations in a blocking task since MigrationHarness is sync
    let applied_migrations =
        tokio::task::spawn_blocking(move || -> Result<usize, Box<dyn Error + Send + Sync>> {
            let mut conn = PgConnection::establish(&database_url)
                .map_err(|e| format!("Failed to establish sync connection: {}", e))?;

            let pending_migrations = conn
                .pending_migrations(MIGRATIONS)
                .map_err(|e| format!("Failed to check pending migrations: {}", e))?;

            if pending_migrations.is_empty() {
                debug!("No pending migrations found");
                return Ok(0);
            }

            info!("Found {} pending migrations", pending_migrations.len());

            let applied = conn
                .run_pending_migrations(MIGRATIONS)
                .map_err(|e| format!("Failed to run migrations: {}", e))?;

            for migration in &applied {
                debug!("Applied migration: {}", migration);
            }

            Ok(applied.len())
        })
        .await
        .map_err(|e| format!("Migration task panicked: {}", e))??;

    info!("Migration process completed successfully");
    Ok(applied_migrations)
}
