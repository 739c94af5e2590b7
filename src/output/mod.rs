//! Output module for collected records and run summaries
//!
//! This module handles:
//! - Accumulating records from concurrent workers
//! - Exporting records as JSON, CSV or into SQLite
//! - Generating markdown and console summaries of a run

mod csv_output;
mod json;
mod markdown;
mod sink;
mod sqlite_output;
pub mod stats;
mod traits;

pub use csv_output::CsvExporter;
pub use json::JsonExporter;
pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use sink::ResultSink;
pub use sqlite_output::SqliteExporter;
pub use stats::print_statistics;
pub use traits::{
    Exporter, OutputError, OutputResult, RunStatus, RunSummary, SectionSummary,
};

use crate::config::{FieldRule, OutputConfig, OutputFormat};

/// Builds the exporter selected by the output configuration
///
/// # Arguments
///
/// * `config` - The output configuration
/// * `rules` - The field rules, which define the exported columns
pub fn build_exporter(config: &OutputConfig, rules: &[FieldRule]) -> Box<dyn Exporter> {
    match config.format {
        OutputFormat::Json => Box::new(JsonExporter::new(&config.path)),
        OutputFormat::Sqlite => Box::new(SqliteExporter::new(&config.path, &config.table, rules)),
        OutputFormat::Csv => Box::new(CsvExporter::new(&config.path, rules)),
    }
}
