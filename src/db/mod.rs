use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::path::Path;
use std::time::Duration;

use crate::config::Config;

pub mod models;
pub mod queries;

pub const MIGRATIONS_DIR: &str = "./migrations";

pub async fn create_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool, dir: &Path) -> anyhow::Result<()> {
    let migrator = Migrator::new(dir).await?;
    migrator.run(pool).await?;
    tracing::info!("Database migrations completed");
    Ok(())
}
