//! Parameterized SQL reports with caching, pagination and multi-format export.
//!
//! Report definitions (name, slug, base query, filter defaults, options,
//! cache TTL) live in a database table. The [ReportsManager] loads a
//! definition, merges caller params with stored filter defaults, executes or
//! paginates the trusted base query, optionally caches the output, and hands
//! back a [ReportResult] that exports to CSV, XML, HTML, JSON, JSON:API and
//! DataTables shapes.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod manager;
pub mod services;

pub use config::Config;
pub use db::{CreateReport, Database, ReportRecord, ReportRepository};
pub use error::ReportsError;
pub use manager::ReportsManager;
pub use services::{ReportCache, ReportExporter, ReportResult, ReportRunner};
