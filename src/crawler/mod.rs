//! Crawler module for catalog fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching behind a swappable transport
//! - HTML extraction of sections, listing items and records
//! - Per-section pagination
//! - Overall crawl coordination

mod coordinator;
mod events;
mod extractor;
mod fetcher;
mod paginator;

pub use coordinator::{run_crawl, Coordinator, CrawlReport};
pub use events::{CrawlEvent, CrawlObserver, RecordingObserver, TracingObserver};
pub use extractor::{extract_links, parse_number, Extractor, ListingItem};
pub use fetcher::{build_http_client, Fetcher, HttpTransport, Transport};
pub use paginator::{Paginator, SectionOutcome};

use crate::config::Config;
use crate::CrawlError;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Compile the configured selectors
/// 2. Build the HTTP client
/// 3. Discover sections on the catalog root
/// 4. Paginate sections and fetch detail pages
/// 5. Return the collected records and statistics
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(CrawlReport)` - The run finished; fatal errors are in `outcome`
/// * `Err(CrawlError)` - The run could not be started
pub async fn crawl(config: Config) -> Result<CrawlReport, CrawlError> {
    run_crawl(config).await
}
