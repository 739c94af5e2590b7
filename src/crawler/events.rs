//! Crawl events and observers
//!
//! The crawl core never formats log lines itself. It reports what happened as
//! [`CrawlEvent`]s to a [`CrawlObserver`]; [`TracingObserver`] turns them into
//! structured `tracing` output.

use crate::state::{CrawlTarget, TargetKind, Termination};
use crate::{ExtractError, FetchError};
use std::sync::{Mutex, PoisonError};

/// Something notable that happened during a run
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlEvent {
    /// A section link was found on the catalog root
    SectionDiscovered { url: String },

    FetchStarted { url: String, kind: TargetKind },

    FetchFailed {
        url: String,
        kind: TargetKind,
        error: FetchError,
    },

    /// A section stopped paginating at `page`
    PageExhausted {
        section: String,
        page: u32,
        reason: Termination,
    },

    RecordExtracted { url: String },

    ExtractFailed { url: String, error: ExtractError },

    /// All listing pages of a section have been processed
    SectionFinished {
        section: String,
        pages: u32,
        items: usize,
        reason: Termination,
    },
}

impl CrawlEvent {
    pub fn fetch_started(target: &CrawlTarget) -> Self {
        Self::FetchStarted {
            url: target.url().to_string(),
            kind: target.kind(),
        }
    }

    pub fn fetch_failed(target: &CrawlTarget, error: FetchError) -> Self {
        Self::FetchFailed {
            url: target.url().to_string(),
            kind: target.kind(),
            error,
        }
    }
}

/// Receives crawl events
///
/// Called from many tasks at once; implementations must not block.
pub trait CrawlObserver: Send + Sync {
    fn on_event(&self, event: &CrawlEvent);
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CrawlObserver for TracingObserver {
    fn on_event(&self, event: &CrawlEvent) {
        match event {
            CrawlEvent::SectionDiscovered { url } => {
                tracing::debug!(section = %url, "Section discovered");
            }
            CrawlEvent::FetchStarted { url, kind } => {
                tracing::trace!(%url, %kind, "Fetching");
            }
            CrawlEvent::FetchFailed { error, .. } if error.is_cancelled() => {
                tracing::debug!(url = %error.url(), "Fetch cancelled");
            }
            CrawlEvent::FetchFailed { url, kind, error } => {
                tracing::warn!(%url, %kind, %error, "Fetch failed");
            }
            CrawlEvent::PageExhausted {
                section,
                page,
                reason,
            } => {
                tracing::debug!(%section, page, reason = reason.label(), "Pagination stopped");
            }
            CrawlEvent::RecordExtracted { url } => {
                tracing::debug!(%url, "Record extracted");
            }
            CrawlEvent::ExtractFailed { url, error } => {
                tracing::warn!(%url, %error, "Extraction failed");
            }
            CrawlEvent::SectionFinished {
                section,
                pages,
                items,
                reason,
            } => {
                tracing::info!(
                    %section,
                    pages,
                    items,
                    reason = reason.label(),
                    "Section finished"
                );
            }
        }
    }
}

/// Keeps every event in memory, in arrival order
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<CrawlEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CrawlEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CrawlObserver for RecordingObserver {
    fn on_event(&self, event: &CrawlEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
