use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use catalog_sweep::config::load_config;
///
/// let config = load_config(Path::new("catalog.toml")).unwrap();
/// println!("Baseline: {}", config.crawler.page_size_baseline);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// The hash is recorded in the run summary so exported data can be traced back
/// to the configuration that produced it.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(hash_content(&content))
}

fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Loads a configuration and returns both the config and its hash
///
/// The file is read once, so the hash always matches the parsed content.
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, hash_content(&content)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldKind, ListingLayout, OutputFormat};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VALID_CONFIG: &str = r#"
[site]
base-url = "https://example.com"
catalog-path = "/catalog/"
section-selector = ".image a"

[crawler]
page-size-baseline = 48
max-pages-per-section = 50
fetch-concurrency = 8

[listing]
layout = "detail-links"
item-selector = "a.thumb"

[[field]]
name = "name"
selector = "h1"
required = true

[[field]]
name = "price"
selector = ".price"
kind = "number"

[[field]]
name = "image"
selector = "img.product-detail-gallery__picture"
attr = "src"
kind = "url"

[output]
format = "sqlite"
path = "./products.db"
table = "products"
"#;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.site.page_param, "PAGEN_1");
        assert_eq!(config.site.decimal_separator, '.');
        assert_eq!(config.crawler.page_size_baseline, 48);
        assert_eq!(config.crawler.fetch_concurrency, 8);
        assert_eq!(config.crawler.section_concurrency, 1);
        assert_eq!(config.listing.layout, ListingLayout::DetailLinks);
        assert_eq!(config.fields.len(), 3);
        assert_eq!(config.fields[1].kind, FieldKind::Number);
        assert_eq!(config.fields[2].attr.as_deref(), Some("src"));
        assert_eq!(config.output.format, OutputFormat::Sqlite);
        assert_eq!(
            config.catalog_url().unwrap().as_str(),
            "https://example.com/catalog/"
        );
    }

    #[test]
    fn test_parse_csv_format() {
        let content = VALID_CONFIG
            .replace("format = \"sqlite\"", "format = \"csv\"")
            .replace("./products.db", "./products.csv");
        let config = parse_config(&content).unwrap();
        assert_eq!(config.output.format, OutputFormat::Csv);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/catalog.toml"));
        assert!(matches!(result.unwrap_err(), ConfigError::Io(_)));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let content = VALID_CONFIG.replace("fetch-concurrency = 8", "fetch-concurrency = 0");
        let file = create_temp_config(&content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_load_config_with_hash() {
        let file = create_temp_config(VALID_CONFIG);
        let (_, hash) = load_config_with_hash(file.path()).unwrap();
        assert_eq!(hash, compute_config_hash(file.path()).unwrap());
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
