//! Runtime configuration loaded from environment variables.

use std::collections::HashMap;
use std::env;

use anyhow::{Context, Result};

/// Crate configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default database URL (the definitions table lives here).
    pub database_url: String,

    /// Named connections available for per-report overrides (`name` -> URL).
    pub connections: HashMap<String, String>,

    /// Connection name reports run on when they carry no override.
    /// None means the default pool.
    pub default_connection: Option<String>,

    /// Table that stores report definitions.
    pub table: String,

    /// Fallback cache TTL (seconds) when neither the report row nor the
    /// caller options set one. 0 disables caching.
    pub cache_ttl: u64,

    /// Maximum number of cached report results held in memory.
    pub cache_capacity: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:reports.db".to_string(),
            connections: HashMap::new(),
            default_connection: None,
            table: "reports".to_string(),
            cache_ttl: 0,
            cache_capacity: 1024,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("REPORTS_DATABASE_URL")
            .or_else(|_| env::var("DATABASE_URL"))
            .unwrap_or_else(|_| "sqlite:reports.db".to_string());

        let connections = env::var("REPORTS_CONNECTIONS")
            .map(|raw| parse_connections(&raw))
            .unwrap_or_default();

        let default_connection = env::var("REPORTS_CONNECTION").ok().filter(|s| !s.is_empty());

        let table = env::var("REPORTS_TABLE").unwrap_or_else(|_| "reports".to_string());

        let cache_ttl = env::var("REPORTS_CACHE_TTL")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .context("Invalid REPORTS_CACHE_TTL")?;

        let cache_capacity = env::var("REPORTS_CACHE_CAPACITY")
            .unwrap_or_else(|_| "1024".to_string())
            .parse()
            .context("Invalid REPORTS_CACHE_CAPACITY")?;

        Ok(Self {
            database_url,
            connections,
            default_connection,
            table,
            cache_ttl,
            cache_capacity,
        })
    }
}

/// Parse `name=url,name=url` pairs. Entries without `=` are skipped.
fn parse_connections(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|entry| {
            let (name, url) = entry.split_once('=')?;
            let name = name.trim();
            let url = url.trim();
            if name.is_empty() || url.is_empty() {
                return None;
            }
            Some((name.to_string(), url.to_string()))
        })
        .collect()
}
