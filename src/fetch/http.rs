//! HTTP fetch client
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - Robots.txt checks (cached per origin)
//! - GET requests with per-request user agent and proxy
//! - Status and Content-Type classification
//! - Markdown conversion, extraction, and chunking of fetched pages
//! - Sitemap discovery

use crate::config::{ClientConfig, UserAgentConfig};
use crate::crawler::{ChunkingStrategy, ExtractionOptions, ExtractionStrategy, FetchOptions};
use crate::fetch::{
    chunk_text, normalize_payload, parse_page, parse_sitemap, CosineExtractor,
    CssSelectorExtractor, ExtractionInput, Extractor, FetchClient, FetchFailure, FetchedPage,
    SitemapDocument,
};
use crate::robots::{fetch_robots, product_token, ParsedRobots, RobotsCache};
use crate::url::origin_string;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER, USER_AGENT};
use reqwest::{redirect::Policy, Client, Proxy, StatusCode};
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// Maximum number of sitemap documents read per level
const MAX_SITEMAP_SOURCES: usize = 8;

/// Maximum number of page URLs taken from sitemaps
const MAX_SITEMAP_URLS: usize = 5000;

/// Formats the default user agent
///
/// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
pub fn format_user_agent(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    )
}

/// Builds an HTTP client with proper configuration
///
/// The user agent is not baked into the client; it is sent per request so a
/// crawl can override it.
///
/// # Arguments
///
/// * `settings` - Timeouts and redirect limit
/// * `proxy` - Optional proxy URL applied to all schemes
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client (e.g. malformed proxy URL)
///
/// # Example
///
/// ```no_run
/// use sumi_trawl::config::ClientConfig;
/// use sumi_trawl::fetch::build_http_client;
///
/// let client = build_http_client(&ClientConfig::default(), None).unwrap();
/// ```
pub fn build_http_client(
    settings: &ClientConfig,
    proxy: Option<&str>,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .redirect(Policy::limited(settings.max_redirects))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = proxy {
        builder = builder.proxy(Proxy::all(proxy)?);
    }

    builder.build()
}

/// Static (non-rendering) fetch client backed by reqwest
///
/// Construct once and share by reference across crawl runs. Pages are never
/// cached; robots.txt rules and per-proxy HTTP clients are.
pub struct ReqwestFetchClient {
    client: Client,
    proxied: Mutex<HashMap<String, Client>>,
    settings: ClientConfig,
    user_agent: String,
    robots: RobotsCache,
    extractors: HashMap<ExtractionStrategy, Arc<dyn Extractor>>,
}

impl ReqwestFetchClient {
    /// Creates a client with the built-in `css_selector` and `cosine`
    /// extractors registered
    ///
    /// # Errors
    ///
    /// Returns the reqwest error if the underlying client cannot be built.
    pub fn new(user_agent: &UserAgentConfig, settings: &ClientConfig) -> crate::Result<Self> {
        let client = build_http_client(settings, None)?;

        let mut extractors: HashMap<ExtractionStrategy, Arc<dyn Extractor>> = HashMap::new();
        extractors.insert(ExtractionStrategy::CssSelector, Arc::new(CssSelectorExtractor));
        extractors.insert(ExtractionStrategy::Cosine, Arc::new(CosineExtractor));

        Ok(Self {
            client,
            proxied: Mutex::new(HashMap::new()),
            settings: settings.clone(),
            user_agent: format_user_agent(user_agent),
            robots: RobotsCache::new(),
            extractors,
        })
    }

    /// Registers the extractor used for `strategy`
    pub fn with_extractor(
        mut self,
        strategy: ExtractionStrategy,
        extractor: impl Extractor + 'static,
    ) -> Self {
        self.extractors.insert(strategy, Arc::new(extractor));
        self
    }

    /// Returns true if pages can be extracted with `strategy`
    pub fn supports(&self, strategy: ExtractionStrategy) -> bool {
        strategy == ExtractionStrategy::None || self.extractors.contains_key(&strategy)
    }

    /// Returns the default user agent header value
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Returns the client for `proxy`, building and caching it on first use
    fn client_for(&self, proxy: Option<&str>) -> Result<Client, FetchFailure> {
        let Some(proxy) = proxy else {
            return Ok(self.client.clone());
        };

        let mut clients = self
            .proxied
            .lock()
            .map_err(|_| FetchFailure::new("Proxy client cache is unavailable"))?;

        if let Some(client) = clients.get(proxy) {
            return Ok(client.clone());
        }

        let client = build_http_client(&self.settings, Some(proxy))
            .map_err(|e| FetchFailure::new(format!("Invalid proxy '{}': {}", proxy, e)))?;
        clients.insert(proxy.to_string(), client.clone());
        tracing::debug!("Built HTTP client for proxy {}", proxy);

        Ok(client)
    }

    /// Returns robots.txt rules for the URL's origin, fetching on a cache miss
    async fn robots_for(&self, client: &Client, url: &Url, user_agent: &str) -> ParsedRobots {
        let Some(origin) = origin_string(url) else {
            return ParsedRobots::allow_all();
        };

        if let Some(robots) = self.robots.get(&origin) {
            return robots;
        }

        let robots = fetch_robots(client, &origin, user_agent).await;
        self.robots.insert(&origin, robots.clone());
        robots
    }

    async fn extract(
        &self,
        url: &str,
        html: &str,
        markdown: Option<&str>,
        options: &ExtractionOptions,
    ) -> Result<Option<Value>, FetchFailure> {
        if options.is_disabled() {
            return Ok(None);
        }

        let extractor = self.extractors.get(&options.strategy).cloned().ok_or_else(|| {
            FetchFailure::new(format!(
                "No extractor registered for strategy '{}'",
                options.strategy.as_str()
            ))
        })?;

        let input = ExtractionInput {
            url,
            html,
            markdown,
        };

        match extractor.extract(&input, options).await {
            Ok(value) => Ok(normalize_payload(value)),
            Err(message) => Err(FetchFailure::new(format!("Extraction failed: {}", message))),
        }
    }

    /// Fetches and parses one sitemap document
    async fn fetch_sitemap(&self, url: &str) -> Option<SitemapDocument> {
        let response = match self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Could not fetch sitemap {}: {}", url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!("Sitemap {} returned {}", url, response.status());
            return None;
        }

        match response.text().await {
            Ok(body) => Some(parse_sitemap(&body)),
            Err(e) => {
                tracing::debug!("Could not read sitemap {}: {}", url, e);
                None
            }
        }
    }
}

#[async_trait]
impl FetchClient for ReqwestFetchClient {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchedPage, FetchFailure> {
        let parsed = Url::parse(url)
            .map_err(|e| FetchFailure::new(format!("Invalid URL '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchFailure::new(format!(
                "Unsupported URL scheme: {}",
                parsed.scheme()
            )));
        }

        if options.screenshot {
            tracing::debug!("Static fetcher cannot take screenshots; ignoring for {}", url);
        }

        let client = self.client_for(options.proxy.as_deref())?;
        let user_agent = options.user_agent.as_deref().unwrap_or(&self.user_agent);

        if self.settings.respect_robots {
            let robots = self.robots_for(&client, &parsed, user_agent).await;
            if !robots.is_allowed(parsed.as_str(), product_token(user_agent)) {
                return Err(FetchFailure::new(format!("Disallowed by robots.txt: {}", url)));
            }
        }

        let response = client
            .get(parsed.clone())
            .header(USER_AGENT, user_agent)
            .send()
            .await
            .map_err(describe_request_error)?;

        let status = response.status();
        let final_url = response.url().clone();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(response.headers());
            let message = match retry_after {
                Some(delay) => format!("HTTP {} (retry after {} seconds)", status, delay.as_secs()),
                None => format!("HTTP {}", status),
            };
            return Err(FetchFailure {
                message,
                status: Some(status.as_u16()),
                retry_after,
            });
        }

        if !status.is_success() {
            return Err(FetchFailure::with_status(
                format!("HTTP {}", status),
                status.as_u16(),
            ));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.is_empty() && !is_html(&content_type) {
            return Err(FetchFailure::with_status(
                format!("Expected HTML, got {}", content_type),
                status.as_u16(),
            ));
        }

        let html = response
            .text()
            .await
            .map_err(|e| FetchFailure::new(format!("Failed to read body of {}: {}", url, e)))?;

        let page = parse_page(&html, &final_url);

        if let Some(selector) = options.wait_for.as_deref() {
            if !contains_selector(&html, selector) {
                tracing::debug!(
                    "Static fetcher cannot wait for '{}'; not present on {}",
                    selector,
                    url
                );
            }
        }

        let markdown = match htmd::convert(&html) {
            Ok(markdown) => Some(markdown),
            Err(e) => {
                tracing::warn!("Markdown conversion failed for {}: {}", url, e);
                None
            }
        };

        let extracted_content = self
            .extract(url, &html, markdown.as_deref(), &options.extraction)
            .await?;

        let chunks = match options.chunking.strategy {
            ChunkingStrategy::None => None,
            _ => Some(chunk_text(
                markdown.as_deref().unwrap_or_default(),
                &options.chunking,
            )),
        };

        tracing::debug!("Fetched {} ({}, {} bytes)", url, status, html.len());

        Ok(FetchedPage {
            final_url: Some(final_url.to_string()),
            status_code: Some(status.as_u16()),
            title: page.title,
            html,
            markdown,
            links: page.links,
            media: page.media,
            metadata: page.metadata,
            extracted_content,
            chunks,
        })
    }

    async fn discover_sitemap(&self, seed: &str) -> Result<Vec<String>, FetchFailure> {
        let seed_url = Url::parse(seed)
            .map_err(|e| FetchFailure::new(format!("Invalid URL '{}': {}", seed, e)))?;
        let origin = origin_string(&seed_url)
            .ok_or_else(|| FetchFailure::new(format!("URL has no origin: {}", seed)))?;

        let mut sources = vec![format!("{}/sitemap.xml", origin)];
        let robots = self.robots_for(&self.client, &seed_url, &self.user_agent).await;
        for sitemap in robots.sitemaps() {
            if !sources.contains(&sitemap) {
                sources.push(sitemap);
            }
        }

        let mut seen = HashSet::new();
        let mut urls = Vec::new();

        for source in sources.into_iter().take(MAX_SITEMAP_SOURCES) {
            let locations = match self.fetch_sitemap(&source).await {
                Some(SitemapDocument::UrlSet(locs)) => locs,
                Some(SitemapDocument::Index(children)) => {
                    let mut locs = Vec::new();
                    for child in children.into_iter().take(MAX_SITEMAP_SOURCES) {
                        if let Some(SitemapDocument::UrlSet(child_locs)) =
                            self.fetch_sitemap(&child).await
                        {
                            locs.extend(child_locs);
                        }
                    }
                    locs
                }
                None => continue,
            };

            for loc in locations {
                if urls.len() >= MAX_SITEMAP_URLS {
                    break;
                }
                if seen.insert(loc.clone()) {
                    urls.push(loc);
                }
            }
        }

        tracing::debug!("Sitemap discovery for {} found {} URLs", seed, urls.len());
        Ok(urls)
    }
}

/// Maps a reqwest error to a failure message
fn describe_request_error(error: reqwest::Error) -> FetchFailure {
    let message = if error.is_timeout() {
        format!("Request timeout: {}", error)
    } else if error.is_connect() {
        format!("Connection failed: {}", error)
    } else if error.is_redirect() {
        format!("Redirect error: {}", error)
    } else {
        error.to_string()
    };

    match error.status() {
        Some(status) => FetchFailure::with_status(message, status.as_u16()),
        None => FetchFailure::new(message),
    }
}

/// Reads `Retry-After` as delta-seconds or an HTTP date
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let wait = date.with_timezone(&Utc) - Utc::now();
    Some(wait.to_std().unwrap_or(Duration::ZERO))
}

fn is_html(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.contains("text/html") || content_type.contains("application/xhtml+xml")
}

fn contains_selector(html: &str, selector: &str) -> bool {
    match Selector::parse(selector) {
        Ok(selector) => Html::parse_document(html).select(&selector).next().is_some(),
        Err(_) => false,
    }
}
