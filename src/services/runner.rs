//! Report execution: binding merge, cache-aside, optional pagination.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde_json::{Map, Value as JsonValue, json};
use sqlx::SqlitePool;
use tracing::debug;

use crate::db::bind::{bind_json, extract_placeholders};
use crate::db::reports::ReportRecord;
use crate::db::sqlite_helpers::row_to_json;
use crate::error::ReportsError;
use crate::services::cache::ReportCache;
use crate::services::result::ReportResult;

/// Builder-style executor for one report definition. Construct via
/// [ReportsManager](crate::manager::ReportsManager), set params/options,
/// then [run](Self::run).
#[derive(Debug)]
pub struct ReportRunner {
    report: ReportRecord,
    pool: SqlitePool,
    cache: Option<Arc<ReportCache>>,
    default_cache_ttl: u64,
    params: Map<String, JsonValue>,
    options: Map<String, JsonValue>,
}

impl ReportRunner {
    pub fn new(
        report: ReportRecord,
        pool: SqlitePool,
        cache: Option<Arc<ReportCache>>,
        default_cache_ttl: u64,
    ) -> Self {
        let options = report.options.as_object().cloned().unwrap_or_default();
        Self {
            report,
            pool,
            cache,
            default_cache_ttl,
            params: Map::new(),
            options,
        }
    }

    /// Build a runner for an ad-hoc query with no persisted definition.
    pub fn from_raw(
        query: &str,
        params: Map<String, JsonValue>,
        options: Map<String, JsonValue>,
        pool: SqlitePool,
        cache: Option<Arc<ReportCache>>,
        default_cache_ttl: u64,
    ) -> Self {
        let now = Utc::now();
        let report = ReportRecord {
            id: 0,
            name: format!("raw-report-{}", random_token(6)),
            slug: format!("raw-report-{}", random_token(8)),
            connection: None,
            description: None,
            base_query: query.to_string(),
            filters: json!({}),
            options: JsonValue::Object(options),
            cache_ttl: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut runner = Self::new(report, pool, cache, default_cache_ttl);
        runner.params = params;
        runner
    }

    /// Replace caller params (placeholder name -> value).
    pub fn params(mut self, params: Map<String, JsonValue>) -> Self {
        self.params = params;
        self
    }

    /// Merge caller options over the stored ones (caller wins).
    pub fn options(mut self, options: Map<String, JsonValue>) -> Self {
        for (key, value) in options {
            self.options.insert(key, value);
        }
        self
    }

    /// Execute the report: merge bindings, consult the cache, run or
    /// paginate the query.
    pub async fn run(&self) -> Result<ReportResult> {
        let bindings = self.merge_bindings();
        let ttl = self.resolve_cache_ttl();

        if ttl > 0 {
            if let Some(cache) = &self.cache {
                let key = self.cache_key(&bindings)?;
                if let Some(hit) = cache.get(&key) {
                    debug!(slug = %self.report.slug, "report cache hit");
                    return Ok(self.to_result(hit.rows.clone(), hit.meta.clone()));
                }

                let (rows, meta) = self.execute(&bindings).await?;
                cache.insert(key, rows.clone(), meta.clone(), Duration::from_secs(ttl));
                return Ok(self.to_result(rows, meta));
            }
        }

        let (rows, meta) = self.execute(&bindings).await?;
        Ok(self.to_result(rows, meta))
    }

    /// Stored filter defaults fill any param the caller omitted; a caller
    /// value always wins. The result is ordered, which makes the cache key
    /// canonical for a given set of bindings.
    fn merge_bindings(&self) -> BTreeMap<String, JsonValue> {
        let mut bindings: BTreeMap<String, JsonValue> = self
            .params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if let Some(filters) = self.report.filters.as_object() {
            for (name, filter) in filters {
                if bindings.contains_key(name) {
                    continue;
                }
                if let Some(default) = filter.get("default") {
                    bindings.insert(name.clone(), default.clone());
                }
            }
        }

        bindings
    }

    /// Caller option, then the stored definition, then the configured
    /// default. 0 disables caching.
    fn resolve_cache_ttl(&self) -> u64 {
        if let Some(ttl) = option_u64(&self.options, "cache_ttl") {
            return ttl;
        }
        match self.report.cache_ttl {
            Some(ttl) => ttl.max(0) as u64,
            None => self.default_cache_ttl,
        }
    }

    fn cache_key(&self, bindings: &BTreeMap<String, JsonValue>) -> Result<String> {
        let base = format!("report:{}", self.report.slug);
        if bindings.is_empty() {
            return Ok(base);
        }
        let encoded = serde_json::to_vec(bindings)?;
        Ok(format!("{}:{:x}", base, md5::compute(&encoded)))
    }

    fn wants_pagination(&self) -> bool {
        self.options.get("paginate").map(truthy).unwrap_or(false)
    }

    async fn execute(
        &self,
        bindings: &BTreeMap<String, JsonValue>,
    ) -> Result<(Vec<JsonValue>, JsonValue)> {
        let query = self.report.base_query.trim();

        if self.wants_pagination() {
            self.paginate(query, bindings).await
        } else {
            let rows = self.select(query, bindings).await?;
            Ok((rows, json!({})))
        }
    }

    /// Wrap the query in a count(*) subquery for the total, then apply
    /// limit/offset for the requested page.
    async fn paginate(
        &self,
        query: &str,
        bindings: &BTreeMap<String, JsonValue>,
    ) -> Result<(Vec<JsonValue>, JsonValue)> {
        let page = option_u64(&self.options, "page").filter(|p| *p > 0).unwrap_or(1) as i64;
        let per_page = option_u64(&self.options, "per_page")
            .filter(|p| *p > 0)
            .unwrap_or(15) as i64;

        let count_sql = format!("select count(*) as aggregate from ({query}) as report_count");
        let (rewritten, names) = extract_placeholders(&count_sql);
        let mut count_query = sqlx::query(&rewritten);
        for name in &names {
            let value = bindings
                .get(name)
                .ok_or_else(|| ReportsError::MissingParameter(name.clone()))?;
            count_query = bind_json(count_query, value);
        }
        let row = count_query
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Report [{}] count query failed", self.report.slug))?;
        let total: i64 = sqlx::Row::try_get(&row, "aggregate")?;

        let offset = (page - 1) * per_page;
        let paged_sql = format!("{query} limit {per_page} offset {offset}");
        let rows = self.select(&paged_sql, bindings).await?;

        let last_page = ((total + per_page - 1) / per_page).max(1);
        let meta = json!({
            "pagination": {
                "total": total,
                "per_page": per_page,
                "current_page": page,
                "last_page": last_page,
            },
        });

        Ok((rows, meta))
    }

    async fn select(
        &self,
        sql: &str,
        bindings: &BTreeMap<String, JsonValue>,
    ) -> Result<Vec<JsonValue>> {
        let (rewritten, names) = extract_placeholders(sql);

        let mut query = sqlx::query(&rewritten);
        for name in &names {
            let value = bindings
                .get(name)
                .ok_or_else(|| ReportsError::MissingParameter(name.clone()))?;
            query = bind_json(query, value);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Report [{}] query failed", self.report.slug))?;

        Ok(rows.iter().map(row_to_json).collect())
    }

    fn to_result(&self, rows: Vec<JsonValue>, meta: JsonValue) -> ReportResult {
        ReportResult::new(&self.report.name, &self.report.slug, rows, meta)
    }
}

fn truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        JsonValue::String(s) => matches!(s.as_str(), "1" | "true" | "yes" | "on"),
        _ => false,
    }
}

fn option_u64(options: &Map<String, JsonValue>, key: &str) -> Option<u64> {
    match options.get(key)? {
        JsonValue::Number(n) => n.as_u64(),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
