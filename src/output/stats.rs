//! Console statistics report

use crate::output::traits::RunSummary;

/// Prints the run summary to stdout in a formatted manner
///
/// # Arguments
///
/// * `summary` - The summary to display
pub fn print_statistics(summary: &RunSummary) {
    print!("{}", format_statistics(summary));
}

/// Formats the console report printed by [`print_statistics`]
pub fn format_statistics(summary: &RunSummary) -> String {
    let stats = &summary.stats;
    let mut out = String::new();

    out.push_str("=== Crawl Statistics ===\n\n");

    out.push_str("Overview:\n");
    out.push_str(&format!("  Status: {}\n", summary.status.as_str()));
    out.push_str(&format!("  Duration: {}s\n", summary.duration_seconds()));
    out.push_str(&format!(
        "  Sections: {} ({} failed)\n",
        stats.sections, stats.sections_failed
    ));
    out.push_str(&format!("  Listing pages: {}\n\n", stats.listing_pages));

    out.push_str("Records:\n");
    out.push_str(&format!("  Discovered: {}\n", stats.discovered));
    out.push_str(&format!("  Fetched: {}\n", stats.fetched));
    out.push_str(&format!("  Failed: {}\n", stats.failed));
    if stats.cancelled > 0 {
        out.push_str(&format!("  Cancelled: {}\n", stats.cancelled));
    }
    if stats.duplicates > 0 {
        out.push_str(&format!("  Duplicates skipped: {}\n", stats.duplicates));
    }
    out.push('\n');

    let failed: Vec<_> = summary.failed_sections().collect();
    if !failed.is_empty() {
        out.push_str(&format!("Failed Sections ({}):\n", failed.len()));
        for section in failed {
            out.push_str(&format!("  - {}\n", section.url));
        }
        out.push('\n');
    }

    if let Some(error) = &summary.error {
        out.push_str(&format!("Fatal error: {}\n\n", error));
    }

    out.push_str(&format!(
        "Success Rate: {:.1}% ({} / {} records successfully extracted)\n",
        stats.success_rate(),
        stats.fetched,
        stats.settled()
    ));

    out
}
