use crate::UrlError;
use url::Url;

/// Tracking query parameters dropped when computing dedup keys
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "yclid", "mc_eid", "_openstat"];

/// Strips the trailing `:` that source link extraction sometimes leaves behind
///
/// Only a single trailing colon is removed; surrounding whitespace is trimmed first.
///
/// # Examples
///
/// ```
/// use catalog_sweep::url::strip_trailing_colon;
///
/// assert_eq!(strip_trailing_colon("https://example.com/p/1/:"), "https://example.com/p/1/");
/// assert_eq!(strip_trailing_colon("https://example.com/p/1/"), "https://example.com/p/1/");
/// ```
pub fn strip_trailing_colon(url: &str) -> &str {
    let url = url.trim();
    url.strip_suffix(':').unwrap_or(url)
}

/// Normalizes a URL so that two spellings of the same page compare equal
///
/// # Normalization Steps
///
/// 1. Strip a trailing `:` artifact and parse; reject if malformed
/// 2. Require an HTTP(S) scheme and a host (host is lowercased by the parser)
/// 3. Collapse empty path segments and drop the trailing slash (except root)
/// 4. Remove the fragment
/// 5. Remove tracking query parameters, sort the rest, drop an empty query
///
/// The result is used as the dedup key for detail pages. It is not what gets
/// fetched; see [`strip_trailing_colon`] for that.
///
/// # Examples
///
/// ```
/// use catalog_sweep::url::normalize_url;
///
/// let url = normalize_url("https://EXAMPLE.com/catalog/item/?utm_source=x#top:").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/catalog/item");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url =
        Url::parse(strip_trailing_colon(url_str)).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url)
}

/// Returns the dedup key for a discovered link
///
/// Links that cannot be normalized still get a stable key (their colon-stripped
/// spelling) so they take part in deduplication instead of slipping through it.
pub fn dedup_key(url_str: &str) -> String {
    match normalize_url(url_str) {
        Ok(url) => url.into(),
        Err(_) => strip_trailing_colon(url_str).to_string(),
    }
}

/// Builds the URL of page `page` of a paginated listing section
///
/// Any existing value of `param` is replaced; other query parameters are kept.
///
/// # Examples
///
/// ```
/// use catalog_sweep::url::page_url;
///
/// let url = page_url("https://example.com/catalog/tiles/", "PAGEN_1", 3).unwrap();
/// assert_eq!(url.as_str(), "https://example.com/catalog/tiles/?PAGEN_1=3");
/// ```
pub fn page_url(section_url: &str, param: &str, page: u32) -> Result<Url, UrlError> {
    let mut url = Url::parse(strip_trailing_colon(section_url))
        .map_err(|e| UrlError::Parse(e.to_string()))?;

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != param)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(param, &page.to_string());

    Ok(url)
}

/// Collapses empty segments and removes the trailing slash (except for root)
///
/// Dot segments are already resolved by the URL parser.
fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort();
    params
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
