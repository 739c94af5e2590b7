//! Exporter trait and run summary types
//!
//! This module defines the trait interface for record exporters and the
//! data structures describing a finished run.

use crate::crawler::{CrawlReport, SectionOutcome};
use crate::record::Record;
use crate::state::StatsSnapshot;
use crate::CrawlError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to format output: {0}")]
    Format(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Trait for record exporters
///
/// Exporters receive every record of a run at once, after the crawl has
/// finished, so they never race the detail workers.
pub trait Exporter {
    /// Writes the records, returning how many were written
    fn export(&self, records: &[Record]) -> OutputResult<usize>;

    /// Human-readable destination, used in logs
    fn destination(&self) -> String;

    /// Stores run bookkeeping next to the records, where the format allows it
    fn record_run(&self, _summary: &RunSummary) -> OutputResult<()> {
        Ok(())
    }
}

/// Final state of one section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionSummary {
    pub url: String,
    pub pages: u32,
    pub items: usize,
    pub outcome: String,
}

impl From<&SectionOutcome> for SectionSummary {
    fn from(outcome: &SectionOutcome) -> Self {
        Self {
            url: outcome.section_url.clone(),
            pages: outcome.pages,
            items: outcome.items,
            outcome: outcome.termination.label().to_string(),
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Cancelled,
    Aborted,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Aborted => "aborted",
        }
    }

    fn of(outcome: &Result<(), CrawlError>) -> Self {
        match outcome {
            Ok(()) => Self::Completed,
            Err(CrawlError::Cancelled) => Self::Cancelled,
            Err(_) => Self::Aborted,
        }
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    // Run metadata
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub config_hash: String,
    pub catalog_url: String,
    pub status: RunStatus,

    pub stats: StatsSnapshot,
    pub records_exported: usize,
    pub sections: Vec<SectionSummary>,

    /// Fatal error text, if the run aborted
    pub error: Option<String>,
}

impl RunSummary {
    /// Builds the summary of a finished run
    pub fn from_report(
        report: &CrawlReport,
        started_at: DateTime<Utc>,
        config_hash: impl Into<String>,
        catalog_url: impl Into<String>,
    ) -> Self {
        let mut sections: Vec<SectionSummary> =
            report.sections.iter().map(SectionSummary::from).collect();
        sections.sort_by(|a, b| a.url.cmp(&b.url));

        Self {
            started_at,
            finished_at: Utc::now(),
            config_hash: config_hash.into(),
            catalog_url: catalog_url.into(),
            status: RunStatus::of(&report.outcome),
            stats: report.stats,
            records_exported: report.records.len(),
            sections,
            error: report.outcome.as_ref().err().map(ToString::to_string),
        }
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }

    pub fn failed_sections(&self) -> impl Iterator<Item = &SectionSummary> {
        self.sections.iter().filter(|s| s.outcome == "failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Termination;
    use crate::FetchError;
    use chrono::Duration;

    fn report(outcome: Result<(), CrawlError>) -> CrawlReport {
        CrawlReport {
            records: Vec::new(),
            stats: StatsSnapshot {
                discovered: 10,
                fetched: 9,
                failed: 1,
                ..Default::default()
            },
            sections: vec![
                SectionOutcome {
                    section_url: "https://shop.test/catalog/b/".to_string(),
                    pages: 2,
                    items: 10,
                    termination: Termination::PartialPage,
                },
                SectionOutcome {
                    section_url: "https://shop.test/catalog/a/".to_string(),
                    pages: 0,
                    items: 0,
                    termination: Termination::Failed(FetchError::HttpStatus {
                        url: "https://shop.test/catalog/a/?PAGEN_1=1".to_string(),
                        status: 500,
                    }),
                },
            ],
            outcome,
        }
    }

    #[test]
    fn test_from_report() {
        let started = Utc::now() - Duration::seconds(90);
        let summary =
            RunSummary::from_report(&report(Ok(())), started, "abc", "https://shop.test/");

        assert_eq!(summary.status, RunStatus::Completed);
        assert!(summary.duration_seconds() >= 90);
        assert_eq!(summary.sections[0].url, "https://shop.test/catalog/a/");
        assert_eq!(summary.sections[0].outcome, "failed");
        assert_eq!(summary.failed_sections().count(), 1);
        assert_eq!(summary.stats.fetched, 9);
    }

    #[test]
    fn test_status() {
        let started = Utc::now();
        let cancelled =
            RunSummary::from_report(&report(Err(CrawlError::Cancelled)), started, "", "");
        assert_eq!(cancelled.status, RunStatus::Cancelled);

        let aborted = RunSummary::from_report(
            &report(Err(CrawlError::Catalog {
                url: "https://shop.test/".to_string(),
                source: FetchError::Timeout {
                    url: "https://shop.test/".to_string(),
                },
            })),
            started,
            "",
            "",
        );
        assert_eq!(aborted.status, RunStatus::Aborted);
        assert!(aborted.error.unwrap().contains("Catalog root"));
    }
}
