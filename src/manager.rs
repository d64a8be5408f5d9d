//! Entry point facade: load definitions, build runners, render results.

use std::sync::Arc;

use anyhow::Result;
use serde_json::{Map, Value as JsonValue};
use tracing::info;

use crate::config::Config;
use crate::db::reports::ReportRecord;
use crate::db::{Database, ReportRepository, ensure_schema};
use crate::error::ReportsError;
use crate::services::cache::ReportCache;
use crate::services::result::ReportResult;
use crate::services::runner::ReportRunner;

/// Owns the pools, the definitions repository and the shared result cache.
pub struct ReportsManager {
    db: Database,
    repository: ReportRepository,
    cache: Arc<ReportCache>,
    config: Config,
}

impl ReportsManager {
    /// Build a manager over already-connected pools. The definitions table
    /// must exist; use [connect](Self::connect) to bootstrap it.
    pub fn new(db: Database, config: Config) -> Self {
        let repository = ReportRepository::new(db.pool().clone(), &config.table);
        let cache = Arc::new(ReportCache::new(config.cache_capacity));
        Self {
            db,
            repository,
            cache,
            config,
        }
    }

    /// Connect every configured pool and ensure the definitions table.
    pub async fn connect(config: Config) -> Result<Self> {
        let db = Database::connect(&config).await?;
        ensure_schema(db.pool(), &config.table).await?;
        info!(table = %config.table, "reports manager ready");
        Ok(Self::new(db, config))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn repository(&self) -> &ReportRepository {
        &self.repository
    }

    pub fn cache(&self) -> &Arc<ReportCache> {
        &self.cache
    }

    /// Build a runner for the active definition with the given slug.
    pub async fn report(&self, slug: &str) -> Result<ReportRunner> {
        let record = self
            .repository
            .find_active_by_slug(slug)
            .await?
            .ok_or_else(|| ReportsError::ReportNotFound(slug.to_string()))?;

        self.runner_for(record)
    }

    /// Build a runner for an already-loaded definition.
    pub fn report_from(&self, record: ReportRecord) -> Result<ReportRunner> {
        self.runner_for(record)
    }

    /// Run an ad-hoc query with no persisted definition. The options may
    /// carry `connection` and `cache_ttl`.
    pub async fn raw(
        &self,
        query: &str,
        params: Map<String, JsonValue>,
        options: Map<String, JsonValue>,
    ) -> Result<ReportResult> {
        let connection = options
            .get("connection")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| self.config.default_connection.clone());

        let pool = self.db.connection(connection.as_deref())?.clone();

        ReportRunner::from_raw(
            query,
            params,
            options,
            pool,
            Some(self.cache.clone()),
            self.config.cache_ttl,
        )
        .run()
        .await
    }

    /// Run a stored report and serialize the result to compact JSON, for
    /// embedding in templates or API payloads.
    pub async fn render(
        &self,
        slug: &str,
        params: Map<String, JsonValue>,
        options: Map<String, JsonValue>,
    ) -> Result<String> {
        let result = self
            .report(slug)
            .await?
            .params(params)
            .options(options)
            .run()
            .await?;

        Ok(result.to_json())
    }

    /// The record's own connection override wins over the configured
    /// default connection; both absent means the default pool.
    fn runner_for(&self, record: ReportRecord) -> Result<ReportRunner> {
        let connection = record
            .connection
            .as_deref()
            .or(self.config.default_connection.as_deref());
        let pool = self.db.connection(connection)?.clone();

        Ok(ReportRunner::new(
            record,
            pool,
            Some(self.cache.clone()),
            self.config.cache_ttl,
        ))
    }
}
