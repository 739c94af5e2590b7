//! Crawler coordinator - main crawl orchestration logic
//!
//! This module ties the pipeline together:
//! - Fetching the catalog root and discovering sections
//! - Paginating sections with bounded parallelism
//! - Deduplicating detail links and spawning detail workers
//! - Waiting for all outstanding work and draining the sink
//!
//! The run always finalizes: whatever was collected is returned in a
//! [`CrawlReport`] next to the run outcome.

use crate::config::Config;
use crate::crawler::events::{CrawlEvent, CrawlObserver, TracingObserver};
use crate::crawler::extractor::{Extractor, ListingItem};
use crate::crawler::fetcher::{Fetcher, HttpTransport, Transport};
use crate::crawler::paginator::{Paginator, SectionOutcome};
use crate::output::ResultSink;
use crate::record::Record;
use crate::state::{CrawlStats, CrawlTarget, SeenSet, StatsSnapshot};
use crate::url::dedup_key;
use crate::CrawlError;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use url::Url;

/// Everything a finished run produced
#[derive(Debug)]
pub struct CrawlReport {
    /// Drained sink contents, in completion order
    pub records: Vec<Record>,

    pub stats: StatsSnapshot,

    /// One entry per paginated section, in completion order
    pub sections: Vec<SectionOutcome>,

    /// `Err` when the run aborted or was cancelled; the fields above are still valid
    pub outcome: Result<(), CrawlError>,
}

impl CrawlReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// State shared with detail workers
struct WorkerContext {
    fetcher: Fetcher,
    extractor: Extractor,
    semaphore: Semaphore,
    sink: ResultSink,
    stats: Arc<CrawlStats>,
    observer: Arc<dyn CrawlObserver>,
    cancel: CancellationToken,
}

impl WorkerContext {
    /// Fetches one detail page and appends its record
    ///
    /// Every outcome is absorbed here; a failing detail page never affects
    /// its siblings.
    async fn process_detail(&self, target: CrawlTarget) {
        if self.cancel.is_cancelled() {
            self.stats.record_cancelled();
            return;
        }

        let fetched = {
            let permit = tokio::select! {
                _ = self.cancel.cancelled() => None,
                permit = self.semaphore.acquire() => permit.ok(),
            };
            let Some(_permit) = permit else {
                self.stats.record_cancelled();
                return;
            };

            self.observer.on_event(&CrawlEvent::fetch_started(&target));
            self.fetcher.fetch(target.url()).await
        };

        let page = match fetched {
            Ok(page) => page,
            Err(error) => {
                if error.is_cancelled() {
                    self.stats.record_cancelled();
                } else {
                    self.stats.record_failed();
                }
                self.observer.on_event(&CrawlEvent::fetch_failed(&target, error));
                return;
            }
        };

        match self.extractor.extract_record(&page.url, &page.body) {
            Ok(record) => {
                self.observer.on_event(&CrawlEvent::RecordExtracted {
                    url: page.url.clone(),
                });
                self.stats.record_fetched();
                self.sink.add(record);
            }
            Err(error) => {
                self.stats.record_failed();
                self.observer.on_event(&CrawlEvent::ExtractFailed {
                    url: page.url,
                    error,
                });
            }
        }
    }

    /// Accepts a listing item: records go straight to the sink, links become
    /// detail work
    fn accept(self: &Arc<Self>, item: ListingItem, seen: &SeenSet, tracker: &TaskTracker) {
        if let Some(key) = item.dedup_key() {
            if !seen.insert(key) {
                self.stats.record_duplicate();
                return;
            }
        }
        self.stats.record_discovered();

        match item {
            ListingItem::Link(url) => {
                let context = Arc::clone(self);
                let target = CrawlTarget::detail(url);
                tracker.spawn(async move { context.process_detail(target).await });
            }
            ListingItem::Record { record, .. } => {
                self.observer.on_event(&CrawlEvent::RecordExtracted {
                    url: record.url().to_string(),
                });
                self.stats.record_fetched();
                self.sink.add(record);
            }
            ListingItem::Invalid { location, error } => {
                self.stats.record_failed();
                self.observer.on_event(&CrawlEvent::ExtractFailed {
                    url: location,
                    error,
                });
            }
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Config,
    fetcher: Fetcher,
    extractor: Extractor,
    observer: Arc<dyn CrawlObserver>,
    stats: Arc<CrawlStats>,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Creates a coordinator that fetches over HTTP
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(CrawlError)` - A selector failed to compile or the HTTP client could
    ///   not be built
    pub fn new(config: Config) -> Result<Self, CrawlError> {
        let transport = HttpTransport::from_config(&config.crawler)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Creates a coordinator on top of an arbitrary transport
    pub fn with_transport(
        config: Config,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, CrawlError> {
        let extractor = Extractor::from_config(&config)?;
        let cancel = CancellationToken::new();
        let fetcher = Fetcher::new(transport, config.crawler.fetch_timeout(), cancel.clone());

        Ok(Self {
            config,
            fetcher,
            extractor,
            observer: Arc::new(TracingObserver),
            stats: Arc::new(CrawlStats::new()),
            cancel,
        })
    }

    /// Replaces the default [`TracingObserver`]
    pub fn with_observer(mut self, observer: Arc<dyn CrawlObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Token that cancels the run when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Live counters, readable while the run is in progress
    pub fn stats(&self) -> Arc<CrawlStats> {
        Arc::clone(&self.stats)
    }

    /// Runs the crawl to completion
    ///
    /// Never fails outright: a fatal error ends up in [`CrawlReport::outcome`]
    /// after all outstanding detail work has settled.
    pub async fn run(self) -> CrawlReport {
        let start_time = std::time::Instant::now();

        let context = Arc::new(WorkerContext {
            fetcher: self.fetcher.clone(),
            extractor: self.extractor.clone(),
            semaphore: Semaphore::new(self.config.crawler.fetch_concurrency),
            sink: ResultSink::new(),
            stats: Arc::clone(&self.stats),
            observer: Arc::clone(&self.observer),
            cancel: self.cancel.clone(),
        });
        let tracker = TaskTracker::new();
        let seen = SeenSet::new();

        let deadline = self.config.crawler.run_timeout().map(|timeout| {
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(timeout) => {
                        tracing::warn!("Run timeout of {:?} reached, cancelling", timeout);
                        cancel.cancel();
                    }
                }
            })
        });

        let (sections, mut outcome) = self.crawl_catalog(&context, &seen, &tracker).await;

        tracker.close();
        tracker.wait().await;

        if let Some(handle) = deadline {
            handle.abort();
        }

        if outcome.is_ok() && self.cancel.is_cancelled() {
            outcome = Err(CrawlError::Cancelled);
        }

        let records = context.sink.drain();
        let stats = self.stats.snapshot();

        tracing::info!(
            "Crawl finished in {:?}: {} records, {} failed, {} cancelled, {} sections",
            start_time.elapsed(),
            records.len(),
            stats.failed,
            stats.cancelled,
            sections.len()
        );

        CrawlReport {
            records,
            stats,
            sections,
            outcome,
        }
    }

    /// Fetches the catalog root and crawls every section it lists
    async fn crawl_catalog(
        &self,
        context: &Arc<WorkerContext>,
        seen: &SeenSet,
        tracker: &TaskTracker,
    ) -> (Vec<SectionOutcome>, Result<(), CrawlError>) {
        let catalog = match self.config.catalog_url() {
            Ok(url) => CrawlTarget::catalog(url),
            Err(e) => {
                self.cancel.cancel();
                return (Vec::new(), Err(e.into()));
            }
        };

        tracing::info!("Fetching catalog root {}", catalog.url());

        let fetched = match context.semaphore.acquire().await {
            Ok(_permit) => {
                self.observer.on_event(&CrawlEvent::fetch_started(&catalog));
                self.fetcher.fetch(catalog.url()).await
            }
            Err(_) => Err(crate::FetchError::Cancelled {
                url: catalog.url().to_string(),
            }),
        };

        let page = match fetched {
            Ok(page) => page,
            Err(source) => {
                self.observer.on_event(&CrawlEvent::fetch_failed(&catalog, source.clone()));
                self.cancel.cancel();
                return (
                    Vec::new(),
                    Err(CrawlError::Catalog {
                        url: catalog.url().to_string(),
                        source,
                    }),
                );
            }
        };

        let mut unique = HashSet::new();
        let section_urls: Vec<String> = self
            .extractor
            .section_links(&page)
            .into_iter()
            .filter(|url| unique.insert(dedup_key(url)))
            .collect();
        drop(page);

        if section_urls.is_empty() {
            tracing::warn!("No sections found on {}", catalog.url());
        } else {
            tracing::info!("Found {} sections", section_urls.len());
        }

        for url in &section_urls {
            self.observer.on_event(&CrawlEvent::SectionDiscovered { url: url.clone() });
        }

        let outcomes = stream::iter(section_urls)
            .map(|section_url| self.crawl_section(context, seen, tracker, section_url))
            .buffer_unordered(self.config.crawler.section_concurrency)
            .collect::<Vec<_>>()
            .await;

        (outcomes, Ok(()))
    }

    /// Paginates one section, scheduling its items as they arrive
    async fn crawl_section(
        &self,
        context: &Arc<WorkerContext>,
        seen: &SeenSet,
        tracker: &TaskTracker,
        section_url: String,
    ) -> SectionOutcome {
        let path = Url::parse(&section_url)
            .map(|url| url.path().to_string())
            .unwrap_or_default();
        let profile = self.config.listing.profile_for(&path);

        self.stats.record_section();

        let paginator = Paginator::new(
            &self.fetcher,
            &self.extractor,
            &context.semaphore,
            self.observer.as_ref(),
            &self.config.site.page_param,
            self.config.crawler.page_size_baseline,
            self.config.crawler.max_pages_per_section,
        );

        let outcome = paginator
            .run(&section_url, &profile, |item| context.accept(item, seen, tracker))
            .await;

        self.stats.record_listing_pages(u64::from(outcome.pages));
        if outcome.termination.is_failure() {
            self.stats.record_section_failed();
        }

        self.observer.on_event(&CrawlEvent::SectionFinished {
            section: outcome.section_url.clone(),
            pages: outcome.pages,
            items: outcome.items,
            reason: outcome.termination.clone(),
        });

        outcome
    }
}

/// Runs a complete crawl over HTTP with the default observer
///
/// # Returns
///
/// * `Ok(CrawlReport)` - The run finished (check `outcome` for fatal errors)
/// * `Err(CrawlError)` - The coordinator could not be set up
pub async fn run_crawl(config: Config) -> Result<CrawlReport, CrawlError> {
    Ok(Coordinator::new(config)?.run().await)
}
