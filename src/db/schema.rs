//! Definitions table bootstrap.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

/// Create the report definitions table if it does not exist yet. The table
/// name comes from configuration; everything else matches the package's
/// canonical migration.
pub async fn ensure_schema(pool: &SqlitePool, table: &str) -> Result<()> {
    let sql = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            connection TEXT,
            description TEXT,
            base_query TEXT NOT NULL,
            filters TEXT,
            options TEXT,
            cache_ttl INTEGER,
            is_active BOOLEAN NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#
    );

    sqlx::query(&sql)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to create reports table [{table}]"))?;

    debug!(table = %table, "reports schema ensured");
    Ok(())
}
