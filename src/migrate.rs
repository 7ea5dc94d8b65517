use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the snapshot table and its indexes. Idempotent.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    ensure_schema(&pool, &config.warehouse.table).await?;
    pool.close().await;
    Ok(())
}

/// `table` must already be validated as a plain identifier.
pub async fn ensure_schema(pool: &SqlitePool, table: &str) -> Result<()> {
    // Append-only: one row per (run, site, date)
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            run_id TEXT NOT NULL,
            site TEXT NOT NULL,
            date TEXT NOT NULL,
            availability INTEGER NOT NULL,
            captured_at INTEGER NOT NULL,
            UNIQUE(run_id, site, date)
        )
        "#
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_captured_at ON {table}(captured_at DESC)"
    ))
    .execute(pool)
    .await?;

    Ok(())
}
