//! Postgres pool and schema migrations

use anyhow::{Context, Result};
use logoscope_core::Config;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::Path;
use std::time::Duration;

const IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const MAX_LIFETIME: Duration = Duration::from_secs(30 * 60);

pub async fn setup_database(config: &Config) -> Result<PgPool> {
    let pool = connect(config).await?;
    migrate(&pool).await?;
    Ok(pool)
}

async fn connect(config: &Config) -> Result<PgPool> {
    let max_connections = config.db_max_connections();
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds()))
        .idle_timeout(IDLE_TIMEOUT)
        .max_lifetime(MAX_LIFETIME)
        .connect(config.database_url())
        .await
        .context("cannot connect to Postgres")?;

    tracing::info!(max_connections, "Postgres pool ready");
    Ok(pool)
}

/// Apply the SQL files in the workspace `migrations/` directory.
async fn migrate(pool: &PgPool) -> Result<()> {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
    Migrator::new(dir.clone())
        .await
        .with_context(|| format!("cannot load migrations from {}", dir.display()))?
        .run(pool)
        .await
        .context("migrations failed")?;

    tracing::info!("Schema up to date");
    Ok(())
}
