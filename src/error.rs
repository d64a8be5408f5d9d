//! User-facing error cases for report lookup, execution and export.
//!
//! Database driver errors are not wrapped here; they propagate through
//! `anyhow::Error` with context added at the call site.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportsError {
    /// No active report definition exists for the given slug.
    #[error("report [{0}] not found or inactive")]
    ReportNotFound(String),

    /// A report or caller referenced a connection name that was never attached.
    #[error("unknown database connection [{0}]")]
    UnknownConnection(String),

    /// The base query contains a placeholder with no caller param and no
    /// filter default.
    #[error("no value for query placeholder [:{0}]; pass it as a param or add a filter default")]
    MissingParameter(String),

    /// The requested export format needs a document backend this build
    /// does not ship.
    #[error("{format} export requires {backend}, which is not available in this build")]
    ExportUnavailable {
        format: &'static str,
        backend: &'static str,
    },
}
