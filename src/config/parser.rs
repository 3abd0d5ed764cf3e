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
/// use sumi_trawl::config::load_config;
///
/// let config = load_config(Path::new("trawl.toml")).unwrap();
/// println!("Max depth: {}", config.crawl.max_depth);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    // Read the configuration file
    let content = std::fs::read_to_string(path)?;

    // Parse TOML
    let config: Config = toml::from_str(&content)?;

    // Validate the configuration
    validate(&config)?;

    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// The hash is stored with every run so results can be traced back to the
/// exact configuration that produced them.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok((Config, String))` - Successfully loaded configuration and its hash
/// * `Err(ConfigError)` - Failed to load or parse the configuration
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const MINIMAL: &str = r#"
[crawl]
url = "https://example.com/"

[user-agent]
crawler-name = "TestCrawler"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"
"#;

    #[test]
    fn test_load_minimal_config_uses_defaults() {
        let file = create_temp_config(MINIMAL);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawl.url, "https://example.com/");
        assert_eq!(config.crawl.max_depth, 3);
        assert_eq!(config.crawl.max_urls, 50);
        assert_eq!(config.crawl.delay_ms, 1000);
        assert!(config.crawl.same_domain_only);
        assert!(config.client.respect_robots);
        assert_eq!(config.retry.max_retries, 3);
        assert!(config.output.database_path.is_none());
        assert_eq!(config.user_agent.crawler_name, "TestCrawler");
    }

    #[test]
    fn test_load_full_config() {
        let config_content = r##"
[crawl]
url = "https://example.com/blog/"
max-depth = 2
max-urls = 20
enable-pagination = true
enable-deep-crawl = true
same-domain-only = false
delay = 250

[user-agent]
crawler-name = "TestCrawler"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[client]
timeout-secs = 15
respect-robots = false

[fetch]
proxy = "http://proxy.local:8080"
wait-for = "#content"

[extraction]
strategy = "css_selector"
schema = { title = "h1", author = { selector = ".byline a", attribute = "href" } }

[chunking]
strategy = "semantic"
max-length = 2000
overlap = 50

[retry]
max-retries = 5
default-delay-ms = 200

[output]
database-path = "./trawl.db"
events-path = "./events.jsonl"
"##;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.client.timeout_secs, 15);
        assert_eq!(config.client.connect_timeout_secs, 10);
        assert!(!config.client.respect_robots);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.output.events_path.as_deref(), Some("./events.jsonl"));

        let request = config.to_request();
        assert_eq!(request.url, "https://example.com/blog/");
        assert_eq!(request.max_depth, 2);
        assert_eq!(request.max_urls, 20);
        assert!(request.enable_pagination);
        assert!(request.enable_deep_crawl);
        assert!(!request.same_domain_only);
        assert_eq!(request.delay_ms, 250);
        assert_eq!(request.fetch.wait_for.as_deref(), Some("#content"));
        assert_eq!(
            request.fetch.extraction.strategy,
            crate::crawler::ExtractionStrategy::CssSelector
        );
        let schema = request.fetch.extraction.schema.unwrap();
        assert_eq!(schema["title"], "h1");
        assert_eq!(schema["author"]["attribute"], "href");
        assert_eq!(request.fetch.chunking.max_length, 2000);

        assert_eq!(config.retry_policy().max_retries(), 5);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let config_content = "this is not valid TOML {{{";
        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = MINIMAL.replace("[crawl]\n", "[crawl]\nmax-urls = 0\n");

        let file = create_temp_config(&config_content);
        let result = load_config(file.path());
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_load_config_with_hash() {
        let file = create_temp_config(MINIMAL);
        let (config, hash) = load_config_with_hash(file.path()).unwrap();
        assert_eq!(config.crawl.max_urls, 50);
        assert_eq!(hash, compute_config_hash(file.path()).unwrap());
    }

    #[test]
    fn test_compute_config_hash() {
        let config_content = "test content";
        let file = create_temp_config(config_content);

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        // Same content should produce same hash
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64); // SHA-256 produces 64 hex characters
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
