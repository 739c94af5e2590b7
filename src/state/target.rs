//! Crawl target definitions
//!
//! This module defines what the coordinator schedules (a URL plus the kind of page
//! it is expected to be) and the transient fetched page handed to extraction.
use std::fmt;

/// The role a page plays in the catalog hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// The catalog root enumerating sections
    Catalog,

    /// One page of a paginated listing section
    Listing,

    /// A leaf page yielding a single record
    Detail,
}

impl TargetKind {
    /// Returns a short lowercase label used in events and summaries
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Listing => "listing",
            Self::Detail => "detail",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A URL scheduled for fetching, tagged with its expected page kind
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CrawlTarget {
    url: String,
    kind: TargetKind,
}

impl CrawlTarget {
    pub fn new(url: impl Into<String>, kind: TargetKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }

    pub fn catalog(url: impl Into<String>) -> Self {
        Self::new(url, TargetKind::Catalog)
    }

    pub fn listing(url: impl Into<String>) -> Self {
        Self::new(url, TargetKind::Listing)
    }

    pub fn detail(url: impl Into<String>) -> Self {
        Self::new(url, TargetKind::Detail)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }
}

/// A fetched page body, owned by the step that fetched it
#[derive(Debug, Clone)]
pub struct Page {
    /// The URL actually requested (after trailing-colon cleanup)
    pub url: String,

    /// Raw response body
    pub body: String,
}
