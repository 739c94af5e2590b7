//! Markdown summary generation
//!
//! This module generates human-readable markdown summaries of a finished run,
//! including counters, per-section outcomes and the fatal error, if any.

use crate::output::traits::{OutputResult, RunSummary};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Generates a markdown summary of a run
///
/// # Arguments
///
/// * `summary` - The run summary data
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn generate_markdown_summary(summary: &RunSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run summary as markdown
pub fn format_markdown_summary(summary: &RunSummary) -> String {
    let mut md = String::new();
    let stats = &summary.stats;

    md.push_str("# Catalog-Sweep Run Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Catalog**: {}\n", summary.catalog_url));
    md.push_str(&format!("- **Started**: {}\n", summary.started_at.to_rfc3339()));
    md.push_str(&format!("- **Finished**: {}\n", summary.finished_at.to_rfc3339()));
    let duration = summary.duration_seconds();
    md.push_str(&format!(
        "- **Duration**: {} seconds ({:.2} minutes)\n",
        duration,
        duration as f64 / 60.0
    ));
    md.push_str(&format!("- **Status**: {}\n", summary.status.as_str()));
    md.push_str(&format!("- **Config Hash**: {}\n\n", summary.config_hash));

    if let Some(error) = &summary.error {
        md.push_str("## Fatal Error\n\n");
        md.push_str(&format!("```\n{}\n```\n\n", error));
    }

    md.push_str("## Records\n\n");
    md.push_str("| Counter | Value |\n");
    md.push_str("|---------|-------|\n");
    md.push_str(&format!("| Discovered | {} |\n", stats.discovered));
    md.push_str(&format!("| Fetched | {} |\n", stats.fetched));
    md.push_str(&format!("| Failed | {} |\n", stats.failed));
    md.push_str(&format!("| Cancelled | {} |\n", stats.cancelled));
    md.push_str(&format!("| Duplicates skipped | {} |\n", stats.duplicates));
    md.push_str(&format!("| Exported | {} |\n", summary.records_exported));
    md.push_str(&format!(
        "\n- **Success Rate**: {:.2}%\n\n",
        stats.success_rate()
    ));

    md.push_str("## Sections\n\n");
    md.push_str(&format!(
        "- **Sections**: {} ({} failed)\n",
        stats.sections, stats.sections_failed
    ));
    md.push_str(&format!("- **Listing pages**: {}\n\n", stats.listing_pages));

    if !summary.sections.is_empty() {
        md.push_str("| Section | Pages | Items | Outcome |\n");
        md.push_str("|---------|-------|-------|---------|\n");
        for section in &summary.sections {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                section.url, section.pages, section.items, section.outcome
            ));
        }
        md.push('\n');
    }

    md
}
