use crate::ConfigError;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Value substituted for optional fields whose selector matches nothing
pub const DEFAULT_MISSING_VALUE: &str = "not specified";

/// Main configuration structure for Catalog-Sweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    pub crawler: CrawlerConfig,
    pub listing: ListingConfig,
    #[serde(rename = "field", default)]
    pub fields: Vec<FieldRule>,
    pub output: OutputConfig,
}

impl Config {
    /// Returns the catalog root URL (`base-url` joined with `catalog-path`)
    pub fn catalog_url(&self) -> Result<Url, ConfigError> {
        let base = self.site.base()?;
        base.join(&self.site.catalog_path).map_err(|e| {
            ConfigError::InvalidUrl(format!(
                "Invalid catalog_path '{}': {}",
                self.site.catalog_path, e
            ))
        })
    }
}

/// Target site description
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Scheme and host every relative link is resolved against
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Path of the catalog root, relative to `base_url`
    #[serde(rename = "catalog-path", default = "default_catalog_path")]
    pub catalog_path: String,

    /// Selector for section links on the catalog root
    #[serde(rename = "section-selector")]
    pub section_selector: String,

    /// Query parameter carrying the listing page number
    #[serde(rename = "page-param", default = "default_page_param")]
    pub page_param: String,

    /// Decimal separator used by number fields on this site
    #[serde(rename = "decimal-separator", default = "default_decimal_separator")]
    pub decimal_separator: char,
}

impl SiteConfig {
    /// Parses `base_url`
    pub fn base(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Provisional full-page item count the first listing page is compared against
    #[serde(rename = "page-size-baseline")]
    pub page_size_baseline: usize,

    /// Hard ceiling on listing pages fetched per section
    #[serde(rename = "max-pages-per-section")]
    pub max_pages_per_section: u32,

    /// Maximum number of concurrent fetches (listing and detail pages combined)
    #[serde(rename = "fetch-concurrency", default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    /// Number of sections paginated at the same time
    #[serde(rename = "section-concurrency", default = "default_section_concurrency")]
    pub section_concurrency: usize,

    /// Per-request timeout (milliseconds)
    #[serde(rename = "fetch-timeout-ms", default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Connection establishment timeout (milliseconds)
    #[serde(rename = "connect-timeout-ms", default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Whole-run deadline (seconds); 0 or absent disables it
    #[serde(rename = "run-timeout-secs", default)]
    pub run_timeout_secs: Option<u64>,

    /// User agent sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

impl CrawlerConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// How records are obtained from a listing section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListingLayout {
    /// Each listing item links to a detail page that yields the record
    DetailLinks,

    /// Each listing item carries the whole record
    InlineRecords,
}

/// Listing extraction configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ListingConfig {
    /// Layout used unless an override matches
    pub layout: ListingLayout,

    /// Selector for detail links (detail-links) or item containers (inline-records)
    #[serde(rename = "item-selector")]
    pub item_selector: String,

    /// Field whose value dedups inline records
    #[serde(rename = "key-field", default)]
    pub key_field: Option<String>,

    /// Per-section layout overrides, matched by path prefix
    #[serde(rename = "override", default)]
    pub overrides: Vec<ListingOverride>,
}

/// Layout override for sections under a path prefix
#[derive(Debug, Clone, Deserialize)]
pub struct ListingOverride {
    #[serde(rename = "path-prefix")]
    pub path_prefix: String,

    pub layout: ListingLayout,

    #[serde(rename = "item-selector", default)]
    pub item_selector: Option<String>,

    #[serde(rename = "key-field", default)]
    pub key_field: Option<String>,
}

/// The listing settings that apply to one section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingProfile<'a> {
    pub layout: ListingLayout,
    pub item_selector: &'a str,
    pub key_field: Option<&'a str>,
}

impl ListingConfig {
    /// Resolves the listing settings for a section path
    ///
    /// The override with the longest matching path prefix wins; settings it leaves
    /// unset fall back to the defaults.
    pub fn profile_for(&self, section_path: &str) -> ListingProfile<'_> {
        let matched = self
            .overrides
            .iter()
            .filter(|o| section_path.starts_with(&o.path_prefix))
            .max_by_key(|o| o.path_prefix.len());

        match matched {
            Some(o) => ListingProfile {
                layout: o.layout,
                item_selector: o.item_selector.as_deref().unwrap_or(&self.item_selector),
                key_field: o.key_field.as_deref().or(self.key_field.as_deref()),
            },
            None => ListingProfile {
                layout: self.layout,
                item_selector: &self.item_selector,
                key_field: self.key_field.as_deref(),
            },
        }
    }

    /// All item selectors in use (default plus overrides)
    pub fn item_selectors(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.item_selector.as_str())
            .chain(self.overrides.iter().filter_map(|o| o.item_selector.as_deref()))
    }
}

/// How a field's raw value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Text,
    Number,
    Url,
}

/// Selector-to-field mapping for one record field
#[derive(Debug, Clone, Deserialize)]
pub struct FieldRule {
    pub name: String,

    pub selector: String,

    /// Missing required fields fail the record
    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub kind: FieldKind,

    /// Read this attribute instead of the element text
    #[serde(default)]
    pub attr: Option<String>,

    /// Join all matches with this separator instead of taking the first
    #[serde(default)]
    pub join: Option<String>,

    /// Value used when an optional field matches nothing
    #[serde(default)]
    pub default: Option<String>,
}

impl FieldRule {
    pub fn default_value(&self) -> &str {
        self.default.as_deref().unwrap_or(DEFAULT_MISSING_VALUE)
    }
}

/// Export format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Sqlite,
    /// One flat row per record, `url` first
    Csv,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Path of the exported records file
    pub path: String,

    /// SQLite table name
    #[serde(default = "default_table")]
    pub table: String,

    /// Path of the markdown run summary
    #[serde(rename = "summary-path", default)]
    pub summary_path: Option<String>,
}

fn default_catalog_path() -> String {
    "/".to_string()
}

fn default_page_param() -> String {
    "PAGEN_1".to_string()
}

fn default_decimal_separator() -> char {
    '.'
}

fn default_fetch_concurrency() -> usize {
    16
}

fn default_section_concurrency() -> usize {
    1
}

fn default_fetch_timeout_ms() -> u64 {
    30_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_user_agent() -> String {
    format!("catalog-sweep/{}", env!("CARGO_PKG_VERSION"))
}

fn default_table() -> String {
    "records".to_string()
}
