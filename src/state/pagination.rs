//! Per-section pagination state machine
//!
//! Listing sections do not advertise their page count or page size. The state
//! machine here decides, page by page, whether a section is exhausted: an empty
//! page ends it immediately, a page smaller than the running baseline is taken as
//! the final partial page, and a hard page ceiling bounds pathological sites.

use crate::FetchError;

/// Phase of a section's pagination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationPhase {
    /// Waiting on the current page's body
    Fetching,

    /// Pulling items out of the current page
    Extracting,

    /// The current page was full; the next page will be requested
    Continuing,

    /// Terminal
    Done,
}

/// Why a section stopped paginating
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// A page yielded no new items
    Exhausted,

    /// A page yielded fewer new items than the baseline
    PartialPage,

    /// The configured page ceiling was reached
    Ceiling,

    /// A listing page could not be fetched; the section was abandoned
    Failed(FetchError),
}

impl Termination {
    /// Returns true for a fetch failure that was not caused by cancellation
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(e) if !e.is_cancelled())
    }

    /// Short label for summaries
    pub fn label(&self) -> &'static str {
        match self {
            Self::Exhausted => "exhausted",
            Self::PartialPage => "partial-page",
            Self::Ceiling => "ceiling",
            Self::Failed(e) if e.is_cancelled() => "cancelled",
            Self::Failed(_) => "failed",
        }
    }
}

/// Pagination state for one section, owned by a single paginator run
#[derive(Debug, Clone)]
pub struct PaginationState {
    section_url: String,
    page_index: u32,
    baseline: usize,
    last_page_item_count: usize,
    max_pages: u32,
    phase: PaginationPhase,
}

impl PaginationState {
    /// Creates the state for page 1 of a section
    ///
    /// `baseline` is the provisional full-page size the first page is compared
    /// against; `max_pages` is the hard ceiling on pages fetched.
    pub fn new(section_url: impl Into<String>, baseline: usize, max_pages: u32) -> Self {
        Self {
            section_url: section_url.into(),
            page_index: 1,
            baseline,
            last_page_item_count: 0,
            max_pages: max_pages.max(1),
            phase: PaginationPhase::Fetching,
        }
    }

    pub fn section_url(&self) -> &str {
        &self.section_url
    }

    /// The 1-based index of the page currently being processed
    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    /// The running full-page size
    pub fn baseline(&self) -> usize {
        self.baseline
    }

    pub fn last_page_item_count(&self) -> usize {
        self.last_page_item_count
    }

    pub fn phase(&self) -> PaginationPhase {
        self.phase
    }

    pub fn is_done(&self) -> bool {
        self.phase == PaginationPhase::Done
    }

    /// Marks the start of a page fetch
    pub fn begin_fetching(&mut self) {
        if !self.is_done() {
            self.phase = PaginationPhase::Fetching;
        }
    }

    /// Marks that the current page's body arrived and is being extracted
    pub fn begin_extracting(&mut self) {
        if !self.is_done() {
            self.phase = PaginationPhase::Extracting;
        }
    }

    /// Records the number of new items found on the current page
    ///
    /// Returns the termination reason once the section is finished, or `None`
    /// after advancing to the next page.
    pub fn observe(&mut self, new_items: usize) -> Option<Termination> {
        self.last_page_item_count = new_items;

        if new_items == 0 {
            self.phase = PaginationPhase::Done;
            return Some(Termination::Exhausted);
        }

        if new_items < self.baseline {
            self.phase = PaginationPhase::Done;
            return Some(Termination::PartialPage);
        }

        if self.page_index >= self.max_pages {
            self.phase = PaginationPhase::Done;
            return Some(Termination::Ceiling);
        }

        self.baseline = new_items;
        self.page_index += 1;
        self.phase = PaginationPhase::Continuing;
        None
    }

    /// Ends the section after a listing fetch failure
    pub fn fail(&mut self, error: FetchError) -> Termination {
        self.phase = PaginationPhase::Done;
        Termination::Failed(error)
    }
}
