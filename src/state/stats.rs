//! Run-wide crawl counters
//!
//! Counters only ever increase. They are shared between the coordinator and the
//! detail workers behind an `Arc` and read back as a [`StatsSnapshot`].

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Concurrent crawl counters
#[derive(Debug, Default)]
pub struct CrawlStats {
    discovered: AtomicU64,
    fetched: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    duplicates: AtomicU64,
    sections: AtomicU64,
    sections_failed: AtomicU64,
    listing_pages: AtomicU64,
}

impl CrawlStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// A record candidate (detail URL or inline item) was scheduled
    pub fn record_discovered(&self) {
        self.discovered.fetch_add(1, Ordering::Relaxed);
    }

    /// A record candidate became a record
    pub fn record_fetched(&self) {
        self.fetched.fetch_add(1, Ordering::Relaxed);
    }

    /// A record candidate failed to fetch or extract
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A record candidate was dropped because the run was cancelled
    pub fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// A link was skipped because its dedup key had already been seen
    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_section(&self) {
        self.sections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_section_failed(&self) {
        self.sections_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_listing_pages(&self, count: u64) {
        self.listing_pages.fetch_add(count, Ordering::Relaxed);
    }

    /// Reads all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            discovered: self.discovered.load(Ordering::Relaxed),
            fetched: self.fetched.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            sections: self.sections.load(Ordering::Relaxed),
            sections_failed: self.sections_failed.load(Ordering::Relaxed),
            listing_pages: self.listing_pages.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CrawlStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub discovered: u64,
    pub fetched: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub duplicates: u64,
    pub sections: u64,
    pub sections_failed: u64,
    pub listing_pages: u64,
}

impl StatsSnapshot {
    /// Candidates that reached a terminal outcome
    pub fn settled(&self) -> u64 {
        self.fetched + self.failed + self.cancelled
    }

    /// Returns the success rate as a percentage of settled candidates
    pub fn success_rate(&self) -> f64 {
        let settled = self.settled();
        if settled == 0 {
            return 0.0;
        }
        (self.fetched as f64 / settled as f64) * 100.0
    }
}
