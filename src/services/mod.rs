//! Report execution pipeline: runner, result container, cache, exporters.

pub mod cache;
pub mod exporter;
pub mod result;
pub mod runner;

pub use cache::ReportCache;
pub use exporter::ReportExporter;
pub use result::ReportResult;
pub use runner::ReportRunner;
