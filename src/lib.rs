//! Catalog-Sweep: a bounded-concurrency catalog crawler
//!
//! This crate walks a single site's catalog, paginates every listing section
//! until it runs dry, fetches each detail page through a bounded worker pool and
//! turns it into a structured [`Record`]. One bad page never aborts the run.

pub mod config;
pub mod crawler;
pub mod output;
pub mod record;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Catalog-Sweep runs
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Catalog root {url} could not be crawled: {source}")]
    Catalog { url: String, source: FetchError },

    #[error("Run cancelled before all sections were crawled")]
    Cancelled,

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Errors returned by a single page fetch
///
/// HTTP error statuses are values here, never panics or transport errors, so the
/// caller decides whether a 404 skips an item or aborts a section.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {message}")]
    ConnectionFailed { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Fetch cancelled for {url}")]
    Cancelled { url: String },

    #[error("Invalid URL: {0:?}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Returns the URL the failed request was addressed to
    pub fn url(&self) -> &str {
        match self {
            Self::Timeout { url }
            | Self::ConnectionFailed { url, .. }
            | Self::HttpStatus { url, .. }
            | Self::Cancelled { url } => url,
            Self::InvalidUrl(url) => url,
        }
    }

    /// Returns true if the fetch was abandoned because the run was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Errors produced while turning a document into a record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("Required field '{0}' not found")]
    MissingField(String),

    #[error("Malformed value for field '{field}': {value:?}")]
    MalformedValue { field: String, value: String },

    #[error("Document is empty")]
    EmptyDocument,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector {selector:?}: {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Missing field rule: {0}")]
    MissingRule(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CrawlReport};
pub use record::{FieldValue, Record};
pub use state::{CrawlStats, StatsSnapshot};
pub use crate::url::normalize_url;
