use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::migrate::Migrator;
use sqlx::Postgres;
use anyhow::Context;
use std::path::Path;

use crate::config::Config;

pub mod models;
pub mod queries;

/// One atomic unit of work. Begun with `pool.begin()`, it must be committed
/// explicitly; dropping it rolls everything back.
pub type UnitOfWork<'c> = sqlx::Transaction<'c, Postgres>;

pub async fn create_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
}

async fn migrator() -> anyhow::Result<Migrator> {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
    Ok(Migrator::new(dir).await?)
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    migrator().await?.run(pool).await?;
    tracing::info!("Database migrations completed");
    Ok(())
}

/// Versions shipped in `migrations/` that the database has not applied yet.
pub async fn pending_migrations(pool: &PgPool) -> anyhow::Result<Vec<i64>> {
    let migrator = migrator().await?;
    let applied: Vec<i64> = sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success")
        .fetch_all(pool)
        .await
        .context("migrations table missing")?;

    Ok(migrator
        .iter()
        .map(|migration| migration.version)
        .filter(|version| !applied.contains(version))
        .collect())
}
