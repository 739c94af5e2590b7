use crate::config::types::{
    Config, CrawlerConfig, FieldRule, ListingConfig, OutputConfig, OutputFormat, SiteConfig,
};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;

/// Upper bound on `fetch-concurrency`
const MAX_FETCH_CONCURRENCY: usize = 256;

/// Field names reserved for record metadata columns (compared case-insensitively)
const RESERVED_FIELD_NAMES: &[&str] = &["url", "scraped_at"];

/// Validates the entire configuration
///
/// Runs once at startup; any error here is fatal before the first request.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_crawler_config(&config.crawler)?;
    validate_field_rules(&config.fields)?;
    validate_listing_config(&config.listing, &config.fields)?;
    validate_output_config(&config.output)?;
    config.catalog_url()?;
    Ok(())
}

/// Validates site configuration
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let base = config.base()?;

    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url '{}' must use HTTP or HTTPS",
            config.base_url
        )));
    }

    if base.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url '{}' has no host",
            config.base_url
        )));
    }

    validate_selector(&config.section_selector)?;

    if config.page_param.trim().is_empty() {
        return Err(ConfigError::Validation(
            "page_param cannot be empty".to_string(),
        ));
    }

    if config.decimal_separator != '.' && config.decimal_separator != ',' {
        return Err(ConfigError::Validation(format!(
            "decimal_separator must be '.' or ',', got '{}'",
            config.decimal_separator
        )));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.page_size_baseline < 1 {
        return Err(ConfigError::Validation(
            "page_size_baseline must be >= 1".to_string(),
        ));
    }

    if config.max_pages_per_section < 1 {
        return Err(ConfigError::Validation(
            "max_pages_per_section must be >= 1".to_string(),
        ));
    }

    if config.fetch_concurrency < 1 || config.fetch_concurrency > MAX_FETCH_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "fetch_concurrency must be between 1 and {}, got {}",
            MAX_FETCH_CONCURRENCY, config.fetch_concurrency
        )));
    }

    if config.section_concurrency < 1 {
        return Err(ConfigError::Validation(
            "section_concurrency must be >= 1".to_string(),
        ));
    }

    if config.fetch_timeout_ms == 0 || config.connect_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "fetch_timeout_ms and connect_timeout_ms must be > 0".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates field rules
fn validate_field_rules(rules: &[FieldRule]) -> Result<(), ConfigError> {
    if rules.is_empty() {
        return Err(ConfigError::MissingRule(
            "at least one [[field]] rule is required".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for rule in rules {
        if rule.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "field name cannot be empty".to_string(),
            ));
        }

        let folded = rule.name.to_ascii_lowercase();

        if RESERVED_FIELD_NAMES.contains(&folded.as_str()) {
            return Err(ConfigError::Validation(format!(
                "field name '{}' is reserved",
                rule.name
            )));
        }

        if !names.insert(folded) {
            return Err(ConfigError::Validation(format!(
                "duplicate field name '{}'",
                rule.name
            )));
        }

        if rule.selector.trim().is_empty() {
            return Err(ConfigError::MissingRule(rule.name.clone()));
        }

        validate_selector(&rule.selector)?;
    }

    Ok(())
}

/// Validates listing configuration against the declared field rules
fn validate_listing_config(config: &ListingConfig, rules: &[FieldRule]) -> Result<(), ConfigError> {
    for selector in config.item_selectors() {
        validate_selector(selector)?;
    }

    let key_fields = std::iter::once(config.key_field.as_deref())
        .chain(config.overrides.iter().map(|o| o.key_field.as_deref()))
        .flatten();

    for key_field in key_fields {
        if !rules.iter().any(|rule| rule.name == key_field) {
            return Err(ConfigError::MissingRule(key_field.to_string()));
        }
    }

    for entry in &config.overrides {
        if !entry.path_prefix.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "override path_prefix '{}' must start with '/'",
                entry.path_prefix
            )));
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.path.is_empty() {
        return Err(ConfigError::Validation("output path cannot be empty".to_string()));
    }

    if config.format == OutputFormat::Sqlite && !is_identifier(&config.table) {
        return Err(ConfigError::Validation(format!(
            "table '{}' must be a plain SQL identifier",
            config.table
        )));
    }

    if matches!(&config.summary_path, Some(p) if p.is_empty()) {
        return Err(ConfigError::Validation(
            "summary_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector {
            selector: selector.to_string(),
            message: format!("{:?}", e),
        })
}

/// ASCII letters, digits and underscores, not starting with a digit
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    const BASE: &str = r#"
[site]
base-url = "https://example.com"
section-selector = ".image a"

[crawler]
page-size-baseline = 48
max-pages-per-section = 50

[listing]
layout = "detail-links"
item-selector = "a.thumb"

[[field]]
name = "name"
selector = "h1"
required = true

[output]
path = "out.json"
"#;

    #[test]
    fn test_base_config_is_valid() {
        assert!(parse_config(BASE).is_ok());
    }

    #[test]
    fn test_invalid_selector() {
        let content = BASE.replace("\"a.thumb\"", "\"a..thumb[\"");
        let result = parse_config(&content);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidSelector { .. }
        ));
    }

    #[test]
    fn test_no_field_rules() {
        let content = BASE.replace(
            "[[field]]\nname = \"name\"\nselector = \"h1\"\nrequired = true\n",
            "",
        );
        let result = parse_config(&content);
        assert!(matches!(result.unwrap_err(), ConfigError::MissingRule(_)));
    }

    #[test]
    fn test_key_field_must_have_rule() {
        let content = BASE.replace(
            "item-selector = \"a.thumb\"",
            "item-selector = \"a.thumb\"\nkey-field = \"link\"",
        );
        let result = parse_config(&content);
        assert!(matches!(result.unwrap_err(), ConfigError::MissingRule(f) if f == "link"));
    }

    #[test]
    fn test_duplicate_field_name() {
        let content = format!("{}\n[[field]]\nname = \"name\"\nselector = \"h2\"\n", BASE);
        let result = parse_config(&content);
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_reserved_field_name() {
        let content = format!("{}\n[[field]]\nname = \"url\"\nselector = \"a\"\n", BASE);
        assert!(parse_config(&content).is_err());
    }

    #[test]
    fn test_reserved_field_name_ignores_case() {
        for name in ["URL", "scraped_at", "Scraped_At"] {
            let content = format!(
                "{}\n[[field]]\nname = \"{}\"\nselector = \"a\"\n",
                BASE, name
            );
            assert!(
                matches!(parse_config(&content), Err(ConfigError::Validation(_))),
                "{} should be reserved",
                name
            );
        }
    }

    #[test]
    fn test_duplicate_field_name_ignores_case() {
        let content = format!("{}\n[[field]]\nname = \"Name\"\nselector = \"h2\"\n", BASE);
        let err = parse_config(&content).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("duplicate")));
    }

    #[test]
    fn test_zero_baseline() {
        let content = BASE.replace("page-size-baseline = 48", "page-size-baseline = 0");
        assert!(matches!(
            parse_config(&content).unwrap_err(),
            ConfigError::Validation(_)
        ));
    }

    #[test]
    fn test_bad_base_url() {
        let content = BASE.replace("https://example.com", "ftp://example.com");
        assert!(matches!(
            parse_config(&content).unwrap_err(),
            ConfigError::InvalidUrl(_)
        ));
    }

    #[test]
    fn test_bad_decimal_separator() {
        let content = BASE.replace(
            "section-selector = \".image a\"",
            "section-selector = \".image a\"\ndecimal-separator = \";\"",
        );
        assert!(parse_config(&content).is_err());
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("products"));
        assert!(is_identifier("_tmp_1"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("drop table"));
        assert!(!is_identifier(""));
    }
}
