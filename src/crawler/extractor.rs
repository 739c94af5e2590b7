//! HTML extraction for catalog, listing and detail pages
//!
//! Everything here is a pure function of the document: no I/O, and the parsed
//! `Html` never outlives the call, so callers can hold the results across awaits.
//!
//! - Catalog pages yield section links
//! - Listing pages yield detail links or inline records, depending on layout
//! - Detail pages yield exactly one record or an [`ExtractError`]

use crate::config::{Config, FieldKind, FieldRule, ListingLayout, ListingProfile};
use crate::record::{FieldValue, Record};
use crate::state::Page;
use crate::url::dedup_key;
use crate::{ConfigError, ExtractError};
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashMap, HashSet};
use url::Url;

/// One item found on a listing page
#[derive(Debug, Clone, PartialEq)]
pub enum ListingItem {
    /// Absolute URL of a detail page still to be fetched
    Link(String),

    /// A record extracted directly from the listing, with its key-field value
    Record { record: Record, key: Option<String> },

    /// An inline item whose record could not be extracted
    Invalid {
        /// Where the item was found (`page#item-N`)
        location: String,
        error: ExtractError,
    },
}

impl ListingItem {
    /// Key used to recognize the same item across pages and sections
    ///
    /// Links key on their normalized URL. Inline records key on the value their
    /// key field actually matched; without one they have no run-wide identity.
    pub fn dedup_key(&self) -> Option<String> {
        match self {
            Self::Link(url) => Some(dedup_key(url)),
            Self::Record { key, .. } => key.as_deref().map(dedup_key),
            Self::Invalid { .. } => None,
        }
    }
}

/// A field rule with its selector compiled
#[derive(Debug, Clone)]
struct CompiledRule {
    rule: FieldRule,
    selector: Selector,
}

/// Compiled extraction rules for one run
#[derive(Debug, Clone)]
pub struct Extractor {
    section_selector: Selector,
    item_selectors: HashMap<String, Selector>,
    rules: Vec<CompiledRule>,
    decimal_separator: char,
}

impl Extractor {
    /// Compiles every selector named in the configuration
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let section_selector = compile(&config.site.section_selector)?;

        let mut item_selectors = HashMap::new();
        for selector in config.listing.item_selectors() {
            item_selectors.insert(selector.to_string(), compile(selector)?);
        }

        let rules = config
            .fields
            .iter()
            .map(|rule| {
                Ok(CompiledRule {
                    rule: rule.clone(),
                    selector: compile(&rule.selector)?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            section_selector,
            item_selectors,
            rules,
            decimal_separator: config.site.decimal_separator,
        })
    }

    /// Extracts section links from the catalog root
    pub fn section_links(&self, page: &Page) -> Vec<String> {
        match Url::parse(&page.url) {
            Ok(base) => extract_links(&page.body, &self.section_selector, &base),
            Err(_) => Vec::new(),
        }
    }

    /// Extracts the items of one listing page according to the section's layout
    pub fn listing_items(&self, page: &Page, profile: &ListingProfile<'_>) -> Vec<ListingItem> {
        let Ok(base) = Url::parse(&page.url) else {
            return Vec::new();
        };

        let compiled;
        let selector = match self.item_selectors.get(profile.item_selector) {
            Some(selector) => selector,
            None => match Selector::parse(profile.item_selector) {
                Ok(selector) => {
                    compiled = selector;
                    &compiled
                }
                Err(_) => return Vec::new(),
            },
        };

        match profile.layout {
            ListingLayout::DetailLinks => extract_links(&page.body, selector, &base)
                .into_iter()
                .map(ListingItem::Link)
                .collect(),
            ListingLayout::InlineRecords => {
                self.extract_inline_records(&page.url, &page.body, selector, profile.key_field)
            }
        }
    }

    /// Extracts the record of a detail page
    ///
    /// # Errors
    ///
    /// * `EmptyDocument` - the body is blank
    /// * `MissingField` - a required field's selector matched nothing
    /// * `MalformedValue` - a number or URL field could not be parsed
    pub fn extract_record(&self, url: &str, body: &str) -> Result<Record, ExtractError> {
        if body.trim().is_empty() {
            return Err(ExtractError::EmptyDocument);
        }

        let base = Url::parse(url).ok();
        let document = Html::parse_document(body);
        self.record_from(document.root_element(), url, base.as_ref())
    }

    /// Extracts one record per element matched by `item_selector`
    ///
    /// Field rules are evaluated inside each item; a failing item becomes
    /// [`ListingItem::Invalid`] and does not affect its siblings. With a
    /// `key_field`, each record carries the value that field actually matched,
    /// and an absolute-URL key becomes the record URL.
    pub fn extract_inline_records(
        &self,
        url: &str,
        body: &str,
        item_selector: &Selector,
        key_field: Option<&str>,
    ) -> Vec<ListingItem> {
        let Ok(base) = Url::parse(url) else {
            return Vec::new();
        };
        let document = Html::parse_document(body);

        document
            .select(item_selector)
            .enumerate()
            .map(|(index, item)| {
                let location = format!("{}#item-{}", base, index + 1);
                match self.record_from(item, &location, Some(&base)) {
                    Ok(record) => {
                        let key = key_field.and_then(|name| self.key_value(item, name, &base));
                        ListingItem::Record {
                            record: rekey(record, key.as_deref()),
                            key,
                        }
                    }
                    Err(error) => ListingItem::Invalid { location, error },
                }
            })
            .collect()
    }

    /// The key field's matched value, skipping the optional-field default
    fn key_value(&self, item: ElementRef<'_>, name: &str, base: &Url) -> Option<String> {
        let compiled = self.rules.iter().find(|c| c.rule.name == name)?;
        let raw = raw_value(item, compiled)?;
        match self.convert(&compiled.rule, raw, Some(base)).ok()? {
            FieldValue::Text(text) => Some(text),
            FieldValue::Number(n) => Some(n.to_string()),
        }
    }

    fn record_from(
        &self,
        scope: ElementRef<'_>,
        url: &str,
        base: Option<&Url>,
    ) -> Result<Record, ExtractError> {
        let mut fields = BTreeMap::new();

        for compiled in &self.rules {
            let rule = &compiled.rule;
            let value = match raw_value(scope, compiled) {
                Some(raw) => self.convert(rule, raw, base)?,
                None if rule.required => return Err(ExtractError::MissingField(rule.name.clone())),
                None => FieldValue::Text(rule.default_value().to_string()),
            };
            fields.insert(rule.name.clone(), value);
        }

        Ok(Record::new(url, fields))
    }

    fn convert(
        &self,
        rule: &FieldRule,
        raw: String,
        base: Option<&Url>,
    ) -> Result<FieldValue, ExtractError> {
        let malformed = |value: String| ExtractError::MalformedValue {
            field: rule.name.clone(),
            value,
        };

        match rule.kind {
            FieldKind::Text => Ok(FieldValue::Text(raw)),
            FieldKind::Number => match parse_number(&raw, self.decimal_separator) {
                Some(n) => Ok(FieldValue::Number(n)),
                None => Err(malformed(raw)),
            },
            FieldKind::Url => {
                let resolved = match base {
                    Some(base) => base.join(&raw),
                    None => Url::parse(&raw),
                };
                match resolved {
                    Ok(url) => Ok(FieldValue::Text(url.into())),
                    Err(_) => Err(malformed(raw)),
                }
            }
        }
    }
}

/// Uses the key as the record URL when it is an absolute URL
fn rekey(record: Record, key: Option<&str>) -> Record {
    match key.filter(|key| Url::parse(key).is_ok()) {
        Some(key) => Record::new(key, record.fields().clone()),
        None => record,
    }
}

/// Reads the raw string value of a field inside `scope`
///
/// The scope element itself is considered before its descendants, so inline
/// rules can address attributes of the item container.
fn raw_value(scope: ElementRef<'_>, compiled: &CompiledRule) -> Option<String> {
    let rule = &compiled.rule;
    let own = compiled
        .selector
        .matches(&scope)
        .then_some(scope)
        .into_iter();
    let mut values = own
        .chain(scope.select(&compiled.selector))
        .filter_map(|element| element_value(element, rule.attr.as_deref()))
        .filter(|value| !value.is_empty());

    match &rule.join {
        Some(separator) => {
            let joined = values.collect::<Vec<_>>().join(separator);
            (!joined.is_empty()).then_some(joined)
        }
        None => values.next(),
    }
}

fn element_value(element: ElementRef<'_>, attr: Option<&str>) -> Option<String> {
    match attr {
        Some(name) => element.value().attr(name).map(|v| v.trim().to_string()),
        None => Some(normalize_text(&element.text().collect::<String>())),
    }
}

/// Trims and collapses internal whitespace (including non-breaking spaces)
fn normalize_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses a locale-formatted decimal number
///
/// Whitespace of any kind (regular, NBSP, narrow NBSP) and the thousands
/// separator implied by `decimal_separator` are removed; leading and trailing
/// non-numeric text such as currency symbols or units is ignored.
///
/// # Examples
///
/// ```
/// use catalog_sweep::crawler::parse_number;
///
/// assert_eq!(parse_number("1\u{a0}250,50 руб.", ','), Some(1250.5));
/// assert_eq!(parse_number("$1,250.50", '.'), Some(1250.5));
/// assert_eq!(parse_number(",99 руб.", ','), Some(0.99));
/// assert_eq!(parse_number("on request", '.'), None);
/// ```
pub fn parse_number(raw: &str, decimal_separator: char) -> Option<f64> {
    let thousands = if decimal_separator == ',' { '.' } else { ',' };

    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != thousands && *c != '\'')
        .collect();

    let tail = cleaned.trim_end_matches(|c: char| !c.is_ascii_digit());

    // A separator directly followed by a digit starts a fraction such as ",99"
    let start = tail
        .char_indices()
        .find(|&(i, c)| {
            c.is_ascii_digit()
                || c == '-'
                || c == '+'
                || (c == decimal_separator
                    && tail[i + c.len_utf8()..].starts_with(|n: char| n.is_ascii_digit()))
        })
        .map_or(tail.len(), |(i, _)| i);
    let trimmed = &tail[start..];

    if trimmed.is_empty() {
        return None;
    }

    let normalized = if decimal_separator == ',' {
        trimmed.replace(',', ".")
    } else {
        trimmed.to_string()
    };

    if !normalized
        .chars()
        .enumerate()
        .all(|(i, c)| c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+')))
    {
        return None;
    }

    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Extracts the links matched by `selector`, resolved against `base_url`
///
/// Duplicate links on one page are collapsed, keeping the first occurrence.
/// An empty result is a valid answer, not an error.
pub fn extract_links(html: &str, selector: &Selector, base_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(selector) {
        if let Some(href) = element.value().attr("href") {
            if let Some(absolute_url) = resolve_link(href, base_url) {
                if seen.insert(absolute_url.clone()) {
                    links.push(absolute_url);
                }
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => {
            Some(absolute_url.to_string())
        }
        _ => None,
    }
}

fn compile(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}
