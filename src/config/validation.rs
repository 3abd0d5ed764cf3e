use crate::config::types::{
    ChunkingConfig, ClientConfig, Config, CrawlConfig, ExtractionConfig, FetchConfig,
    OutputConfig, UserAgentConfig,
};
use crate::crawler::{ChunkingStrategy, ExtractionStrategy};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_client_config(&config.client)?;
    validate_fetch_config(&config.fetch)?;
    validate_extraction_config(&config.extraction)?;
    validate_chunking_config(&config.chunking)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the `[crawl]` section
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid crawl url '{}': {}", config.url, e))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "Crawl url '{}' must use http or https",
            config.url
        )));
    }

    if config.max_urls < 1 {
        return Err(ConfigError::Validation(format!(
            "max-urls must be >= 1, got {}",
            config.max_urls
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if config.crawler_version.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-version cannot be empty".to_string(),
        ));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_client_config(config: &ClientConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.connect_timeout_secs > config.timeout_secs {
        return Err(ConfigError::Validation(format!(
            "connect-timeout-secs ({}) cannot exceed timeout-secs ({})",
            config.connect_timeout_secs, config.timeout_secs
        )));
    }

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if let Some(proxy) = &config.proxy {
        Url::parse(proxy)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy '{}': {}", proxy, e)))?;
    }

    if config.user_agent.as_deref().is_some_and(str::is_empty) {
        return Err(ConfigError::Validation(
            "fetch user-agent cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_extraction_config(config: &ExtractionConfig) -> Result<(), ConfigError> {
    match config.strategy {
        ExtractionStrategy::CssSelector if config.schema.is_none() => {
            Err(ConfigError::Validation(
                "css_selector extraction requires a schema".to_string(),
            ))
        }
        ExtractionStrategy::LlmBased if config.provider.is_none() => Err(
            ConfigError::Validation("llm_based extraction requires a provider".to_string()),
        ),
        _ => Ok(()),
    }
}

fn validate_chunking_config(config: &ChunkingConfig) -> Result<(), ConfigError> {
    if config.strategy == ChunkingStrategy::None {
        return Ok(());
    }

    if config.max_length < 1 {
        return Err(ConfigError::Validation(
            "chunking max-length must be >= 1".to_string(),
        ));
    }

    if config.overlap >= config.max_length {
        return Err(ConfigError::Validation(format!(
            "chunking overlap ({}) must be smaller than max-length ({})",
            config.overlap, config.max_length
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.as_deref().is_some_and(str::is_empty) {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.events_path.as_deref().is_some_and(str::is_empty) {
        return Err(ConfigError::Validation(
            "events-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact-email cannot be empty".to_string(),
        ));
    }

    // Basic email format check: must contain @ and have text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
