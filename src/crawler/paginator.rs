//! Listing section pagination
//!
//! Walks `?PAGEN_1=1, 2, ...` for one section until [`PaginationState`] says the
//! section is done. Pages are fetched strictly one after another; every fetch
//! holds a permit from the run-wide semaphore.

use crate::config::ListingProfile;
use crate::crawler::events::{CrawlEvent, CrawlObserver};
use crate::crawler::extractor::{Extractor, ListingItem};
use crate::crawler::fetcher::Fetcher;
use crate::state::{CrawlTarget, Page, PaginationState, Termination};
use crate::url::page_url;
use crate::FetchError;
use std::collections::HashSet;
use tokio::sync::Semaphore;

/// How a section's pagination ended
#[derive(Debug, Clone, PartialEq)]
pub struct SectionOutcome {
    pub section_url: String,

    /// Listing pages successfully fetched
    pub pages: u32,

    /// Items new to this section, across all pages
    pub items: usize,

    pub termination: Termination,
}

/// Paginates listing sections
pub struct Paginator<'a> {
    fetcher: &'a Fetcher,
    extractor: &'a Extractor,
    semaphore: &'a Semaphore,
    observer: &'a dyn CrawlObserver,
    page_param: &'a str,
    baseline: usize,
    max_pages: u32,
}

impl<'a> Paginator<'a> {
    pub fn new(
        fetcher: &'a Fetcher,
        extractor: &'a Extractor,
        semaphore: &'a Semaphore,
        observer: &'a dyn CrawlObserver,
        page_param: &'a str,
        baseline: usize,
        max_pages: u32,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            semaphore,
            observer,
            page_param,
            baseline,
            max_pages,
        }
    }

    /// Paginates one section, handing every new item to `on_item` as soon as
    /// its page has been extracted
    ///
    /// An item counts as new when its key was not seen on an earlier page of this
    /// section, which catches sites that replay the last page for out-of-range
    /// page numbers. Items delivered before a failure stay delivered.
    pub async fn run<F>(
        &self,
        section_url: &str,
        profile: &ListingProfile<'_>,
        mut on_item: F,
    ) -> SectionOutcome
    where
        F: FnMut(ListingItem),
    {
        let mut state = PaginationState::new(section_url, self.baseline, self.max_pages);
        let mut seen = HashSet::new();
        let mut pages = 0;
        let mut items = 0;

        let termination = loop {
            state.begin_fetching();

            let target = match page_url(section_url, self.page_param, state.page_index()) {
                Ok(url) => CrawlTarget::listing(url),
                Err(_) => break state.fail(FetchError::InvalidUrl(section_url.to_string())),
            };

            let page = match self.fetch_page(&target).await {
                Ok(page) => page,
                Err(error) => {
                    self.observer.on_event(&CrawlEvent::fetch_failed(&target, error.clone()));
                    break state.fail(error);
                }
            };
            pages += 1;

            state.begin_extracting();
            let mut new_items = 0;
            for item in self.extractor.listing_items(&page, profile) {
                let is_new = match section_key(&item) {
                    Some(key) => seen.insert(key),
                    None => true,
                };
                if is_new {
                    new_items += 1;
                    on_item(item);
                }
            }
            items += new_items;

            tracing::trace!(
                section = section_url,
                page = state.page_index(),
                new_items,
                "Listing page extracted"
            );

            if let Some(termination) = state.observe(new_items) {
                break termination;
            }
        };

        self.observer.on_event(&CrawlEvent::PageExhausted {
            section: section_url.to_string(),
            page: state.page_index(),
            reason: termination.clone(),
        });

        SectionOutcome {
            section_url: section_url.to_string(),
            pages,
            items,
            termination,
        }
    }

    async fn fetch_page(&self, target: &CrawlTarget) -> Result<Page, FetchError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| FetchError::Cancelled {
                url: target.url().to_string(),
            })?;

        self.observer.on_event(&CrawlEvent::fetch_started(target));
        self.fetcher.fetch(target.url()).await
    }
}

/// Section-local identity of a listing item
///
/// Inline records without a key field fall back to their field contents, so a
/// replayed page still counts as nothing new.
fn section_key(item: &ListingItem) -> Option<String> {
    match item {
        ListingItem::Record { record, key: None } => serde_json::to_string(record.fields()).ok(),
        other => other.dedup_key(),
    }
}
