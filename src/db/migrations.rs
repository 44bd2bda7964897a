use sqlx::{migrate::Migrator, Pool, Postgres};
use tracing::info;

/// SQL files from `migrations/`, embedded at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Run all pending database migrations
///
/// Safe to run repeatedly: sqlx records which migrations were already applied.
pub async fn run_migrations(pool: &Pool<Postgres>) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Running database migrations...");
    MIGRATOR.run(pool).await?;
    info!("Database migrations completed successfully");
    Ok(())
}
