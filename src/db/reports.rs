//! Report definition storage.
//!
//! Definitions are created and maintained by admin tooling; at execution
//! time they are read-only.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use sqlx::SqlitePool;

use crate::db::sqlite_helpers::{json_from_text, now_rfc3339, str_to_datetime, to_json_text};

/// A report definition record in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRecord {
    pub id: i64,
    pub name: String,
    pub slug: String,
    /// Optional named connection the report runs on instead of the default.
    pub connection: Option<String>,
    pub description: Option<String>,
    /// Trusted SQL with `:name` placeholders.
    pub base_query: String,
    /// Mapping of placeholder name to `{"default": value}`.
    pub filters: JsonValue,
    /// Stored execution options; caller options are merged over these.
    pub options: JsonValue,
    /// Cache TTL in seconds. None inherits the configured default, 0
    /// disables caching.
    pub cache_ttl: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for ReportRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        let filters: Option<String> = row.try_get("filters")?;
        let options: Option<String> = row.try_get("options")?;
        let created_str: String = row.try_get("created_at")?;
        let updated_str: String = row.try_get("updated_at")?;

        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            connection: row.try_get("connection")?,
            description: row.try_get("description")?,
            base_query: row.try_get("base_query")?,
            filters: json_from_text(filters.as_deref(), json!({})),
            options: json_from_text(options.as_deref(), json!({})),
            cache_ttl: row.try_get("cache_ttl")?,
            is_active: row.try_get("is_active")?,
            created_at: str_to_datetime(&created_str).map_err(|e| sqlx::Error::Decode(e.into()))?,
            updated_at: str_to_datetime(&updated_str).map_err(|e| sqlx::Error::Decode(e.into()))?,
        })
    }
}

/// Input for creating a new report definition.
#[derive(Debug, Clone)]
pub struct CreateReport {
    pub name: String,
    pub slug: String,
    pub connection: Option<String>,
    pub description: Option<String>,
    pub base_query: String,
    pub filters: JsonValue,
    pub options: JsonValue,
    pub cache_ttl: Option<i64>,
    pub is_active: bool,
}

impl Default for CreateReport {
    fn default() -> Self {
        Self {
            name: String::new(),
            slug: String::new(),
            connection: None,
            description: None,
            base_query: String::new(),
            filters: json!({}),
            options: json!({}),
            cache_ttl: None,
            is_active: true,
        }
    }
}

/// Report definitions repository.
pub struct ReportRepository {
    pool: SqlitePool,
    table: String,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool, table: &str) -> Self {
        Self {
            pool,
            table: table.to_string(),
        }
    }

    /// Insert a new definition and return the stored record.
    pub async fn create(&self, report: CreateReport) -> Result<ReportRecord> {
        let now = now_rfc3339();
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO {} (name, slug, connection, description, base_query,
                            filters, options, cache_ttl, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            self.table
        ))
        .bind(&report.name)
        .bind(&report.slug)
        .bind(&report.connection)
        .bind(&report.description)
        .bind(&report.base_query)
        .bind(to_json_text(&report.filters))
        .bind(to_json_text(&report.options))
        .bind(report.cache_ttl)
        .bind(report.is_active)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let record = self
            .find_by_id(result.last_insert_rowid())
            .await?
            .ok_or_else(|| anyhow::anyhow!("Inserted report [{}] not found", report.slug))?;

        Ok(record)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<ReportRecord>> {
        let record = sqlx::query_as::<_, ReportRecord>(&format!(
            "SELECT * FROM {} WHERE id = ?1",
            self.table
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<ReportRecord>> {
        let record = sqlx::query_as::<_, ReportRecord>(&format!(
            "SELECT * FROM {} WHERE slug = ?1",
            self.table
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Find a definition by slug, restricted to active ones (the execution
    /// path only ever sees these).
    pub async fn find_active_by_slug(&self, slug: &str) -> Result<Option<ReportRecord>> {
        let record = sqlx::query_as::<_, ReportRecord>(&format!(
            "SELECT * FROM {} WHERE slug = ?1 AND is_active = 1",
            self.table
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// List definitions ordered by slug.
    pub async fn list(&self, only_active: bool) -> Result<Vec<ReportRecord>> {
        let sql = if only_active {
            format!(
                "SELECT * FROM {} WHERE is_active = 1 ORDER BY slug",
                self.table
            )
        } else {
            format!("SELECT * FROM {} ORDER BY slug", self.table)
        };

        let records = sqlx::query_as::<_, ReportRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    /// Toggle a definition. Returns false when the slug does not exist.
    pub async fn set_active(&self, slug: &str, active: bool) -> Result<bool> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET is_active = ?1, updated_at = ?2 WHERE slug = ?3",
            self.table
        ))
        .bind(active)
        .bind(now_rfc3339())
        .bind(slug)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove a definition. Returns false when the slug does not exist.
    pub async fn delete(&self, slug: &str) -> Result<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE slug = ?1", self.table))
            .bind(slug)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
