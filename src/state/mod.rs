//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlTarget` / `Page`: what gets fetched and what comes back
//! - `PaginationState`: the per-section termination state machine
//! - `CrawlStats`: run-wide counters shared with the detail workers
//! - `SeenSet`: the shared detail-URL dedup set

mod pagination;
mod seen;
mod stats;
mod target;

// Re-export main types
pub use pagination::{PaginationPhase, PaginationState, Termination};
pub use seen::SeenSet;
pub use stats::{CrawlStats, StatsSnapshot};
pub use target::{CrawlTarget, Page, TargetKind};
