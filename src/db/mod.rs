//! Database connections and report definition storage.

pub mod bind;
pub mod reports;
pub mod schema;
pub mod sqlite_helpers;

pub use reports::{CreateReport, ReportRecord, ReportRepository};
pub use schema::ensure_schema;

use std::collections::HashMap;
use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::config::Config;
use crate::error::ReportsError;

/// Connection pools: the default pool (where definitions live) plus any
/// named pools available for per-report overrides.
#[derive(Clone)]
pub struct Database {
    default: SqlitePool,
    named: HashMap<String, SqlitePool>,
}

impl Database {
    /// Wrap an existing pool with no named connections.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            default: pool,
            named: HashMap::new(),
        }
    }

    /// Connect the default pool and every configured named connection.
    pub async fn connect(config: &Config) -> Result<Self> {
        let default = connect_pool(&config.database_url)
            .await
            .with_context(|| format!("Failed to connect [{}]", config.database_url))?;

        let mut named = HashMap::new();
        for (name, url) in &config.connections {
            let pool = connect_pool(url)
                .await
                .with_context(|| format!("Failed to connect [{name}] at [{url}]"))?;
            named.insert(name.clone(), pool);
        }

        Ok(Self { default, named })
    }

    /// Attach an additional named connection at runtime.
    pub async fn attach(&mut self, name: &str, url: &str) -> Result<()> {
        let pool = connect_pool(url)
            .await
            .with_context(|| format!("Failed to connect [{name}] at [{url}]"))?;
        self.named.insert(name.to_string(), pool);
        Ok(())
    }

    /// The default pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.default
    }

    /// Resolve a connection override. None is the default pool; an unknown
    /// name is an error rather than a silent fallback.
    pub fn connection(&self, name: Option<&str>) -> Result<&SqlitePool, ReportsError> {
        match name {
            None => Ok(&self.default),
            Some(name) => self
                .named
                .get(name)
                .ok_or_else(|| ReportsError::UnknownConnection(name.to_string())),
        }
    }

    /// Get the maximum connection pool size from environment or default.
    fn max_connections() -> u32 {
        std::env::var("REPORTS_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5)
    }
}

async fn connect_pool(url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

    // Each in-memory SQLite connection is its own database; a larger pool
    // would fan queries across distinct empty databases.
    let max_connections = if url.contains(":memory:") {
        1
    } else {
        Database::max_connections()
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}
