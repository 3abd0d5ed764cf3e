//! Integration tests for the crawler
//!
//! The first group uses wiremock to serve real sites to the reqwest-backed
//! fetch client and tests the full crawl cycle end-to-end. The second group
//! drives the coordinator with generated in-memory sites to check run-wide
//! properties (budget, depth, duplicates, ordering, retries).

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashSet;
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use sumi_trawl::config::{load_config_with_hash, ClientConfig, UserAgentConfig};
use sumi_trawl::crawler::{
    Coordinator, CrawlEvent, CrawlRequest, CrawlResult, ExtractionOptions, ExtractionStrategy,
    FetchOptions, Origin, RetryPolicy,
};
use sumi_trawl::fetch::{FetchClient, FetchFailure, FetchedPage, ReqwestFetchClient};
use sumi_trawl::output::{EventSink, StorageSink};
use sumi_trawl::storage::{RunStatus, SqliteStorage, Storage};
use sumi_trawl::url::frontier_key;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

fn http_client() -> ReqwestFetchClient {
    ReqwestFetchClient::new(&user_agent(), &ClientConfig::default())
        .expect("Failed to build client")
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html; charset=utf-8")
}

async fn mount_page(server: &MockServer, page: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(html(body))
        .mount(server)
        .await;
}

async fn run(client: &dyn FetchClient, request: CrawlRequest) -> Vec<CrawlEvent> {
    Coordinator::new(client, request).run().collect().await
}

fn results(events: &[CrawlEvent]) -> Vec<&CrawlResult> {
    events.iter().filter_map(CrawlEvent::as_result).collect()
}

fn finished_total(events: &[CrawlEvent]) -> usize {
    match events.last() {
        Some(CrawlEvent::Finished(summary)) => summary.total,
        other => panic!("Expected Finished as last event, got {:?}", other),
    }
}

// ===== End-to-end against mock servers =====

#[tokio::test]
async fn test_seed_only_crawl() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><head><title>Home</title><meta name="description" content="Start"></head>
        <body><main><h1>Welcome</h1><p>Hello there.</p><a href="/next">Next</a></main></body></html>"#,
    )
    .await;

    let client = http_client();
    let seed = format!("{}/", server.uri());
    let events = run(&client, CrawlRequest::new(seed.clone())).await;

    let kinds: Vec<_> = events.iter().map(CrawlEvent::kind).collect();
    assert_eq!(kinds, vec!["site_map", "result", "progress", "finished"]);

    match &events[0] {
        CrawlEvent::SiteMap(summary) => {
            assert_eq!(summary.base_url, seed);
            assert!(!summary.sitemap_available);
        }
        other => panic!("Expected SiteMap, got {:?}", other),
    }

    let result = results(&events)[0];
    assert!(result.success);
    assert_eq!(result.url, seed);
    assert_eq!(result.depth, 0);
    assert_eq!(result.source, Origin::Direct);
    assert_eq!(result.status_code, Some(200));
    assert_eq!(result.title.as_deref(), Some("Home"));
    assert!(result.markdown.as_deref().unwrap_or_default().contains("Welcome"));
    assert_eq!(
        result.metadata.as_ref().and_then(|m| m.get("description")).map(String::as_str),
        Some("Start")
    );
    assert!(result.pagination_info.is_none());
    assert_eq!(finished_total(&events), 1);
}

#[tokio::test]
async fn test_rel_next_chain_followed() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><head><link rel="next" href="/page/2"></head><body><p>One</p></body></html>"#,
    )
    .await;
    mount_page(&server, "/page/2", "<html><body><p>Two</p></body></html>").await;

    let client = http_client();
    let mut request = CrawlRequest::new(format!("{}/", server.uri()));
    request.enable_pagination = true;
    let events = run(&client, request).await;

    let results = results(&events);
    assert_eq!(results.len(), 2);

    let first = results[0].pagination_info.as_ref().unwrap();
    assert!(first.has_pagination);
    assert_eq!(
        first.next_page_url.as_deref(),
        Some(format!("{}/page/2", server.uri()).as_str())
    );

    assert_eq!(results[1].url, format!("{}/page/2", server.uri()));
    assert_eq!(results[1].source, Origin::Pagination);
    assert_eq!(results[1].depth, 1);
    assert!(!results[1].pagination_info.as_ref().unwrap().has_pagination);
    assert_eq!(finished_total(&events), 2);
}

#[tokio::test]
async fn test_deep_crawl_stays_on_site() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><body>
            <nav><a href="/menu">Menu</a></nav>
            <main>
                <a href="/a">A</a>
                <a href="/b#section">B</a>
                <a href="http://elsewhere.invalid/x">Elsewhere</a>
            </main>
        </body></html>"#,
    )
    .await;
    mount_page(&server, "/a", r#"<html><body><main><a href="/c">C</a></main></body></html>"#).await;
    mount_page(&server, "/b", "<html><body>B</body></html>").await;

    let client = http_client();
    let mut request = CrawlRequest::new(format!("{}/", server.uri()));
    request.enable_deep_crawl = true;
    request.max_depth = 1;
    let events = run(&client, request).await;

    let urls: Vec<_> = results(&events).iter().map(|r| r.url.clone()).collect();
    assert_eq!(
        urls,
        vec![
            format!("{}/", server.uri()),
            format!("{}/a", server.uri()),
            format!("{}/b", server.uri()),
        ]
    );
    assert!(results(&events)[1..]
        .iter()
        .all(|r| r.source == Origin::DeepCrawl && r.depth == 1));
}

#[tokio::test]
async fn test_robots_disallowed_page_is_not_fetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"),
        )
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/",
        r#"<html><body><main><a href="/private/report">Report</a></main></body></html>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/private/report"))
        .respond_with(html("<html><body>secret</body></html>"))
        .expect(0)
        .mount(&server)
        .await;

    let client = http_client();
    let mut request = CrawlRequest::new(format!("{}/", server.uri()));
    request.enable_deep_crawl = true;
    let events = run(&client, request).await;

    let results = results(&events);
    assert_eq!(results.len(), 2);
    assert!(results[0].success);
    assert!(!results[1].success);
    assert!(results[1]
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("robots.txt"));
}

#[tokio::test]
async fn test_429_with_retry_after_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(&server, "/", "<html><head><title>Finally</title></head></html>").await;

    let client = http_client();
    let started = std::time::Instant::now();
    let events = run(&client, CrawlRequest::new(format!("{}/", server.uri()))).await;

    assert!(started.elapsed() >= Duration::from_secs(1));
    let result = results(&events)[0];
    assert!(result.success);
    assert_eq!(result.retries, 1);
    assert_eq!(result.title.as_deref(), Some("Finally"));
}

#[tokio::test]
async fn test_http_error_becomes_failed_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let client = http_client();
    let events = run(&client, CrawlRequest::new(format!("{}/", server.uri()))).await;

    let result = results(&events)[0];
    assert!(!result.success);
    assert_eq!(result.retries, 0);
    assert!(result.error.as_deref().unwrap_or_default().contains("500"));
    assert_eq!(finished_total(&events), 1);
}

#[tokio::test]
async fn test_sitemap_seeds_frontier() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
                <url><loc>{base}/docs/a</loc></url>
                <url><loc>{base}/docs/b</loc></url>
                <url><loc>http://elsewhere.invalid/docs/c</loc></url>
            </urlset>"#
        )))
        .mount(&server)
        .await;
    mount_page(&server, "/", "<html><body>Home</body></html>").await;
    mount_page(&server, "/docs/a", "<html><body>A</body></html>").await;
    mount_page(&server, "/docs/b", "<html><body>B</body></html>").await;

    let client = http_client();
    let mut request = CrawlRequest::new(format!("{}/", base));
    request.enable_deep_crawl = true;
    let events = run(&client, request).await;

    match &events[0] {
        CrawlEvent::SiteMap(summary) => {
            assert!(summary.sitemap_available);
            assert_eq!(summary.sitemap_urls_count, 3);
            let groups = summary.site_structure.sitemap.as_ref().unwrap();
            assert_eq!(groups["/docs"].len(), 3);
        }
        other => panic!("Expected SiteMap, got {:?}", other),
    }

    let results = results(&events);
    assert_eq!(results.len(), 3);
    assert_eq!(results[1].url, format!("{}/docs/a", base));
    assert_eq!(results[1].source, Origin::Sitemap);
    assert_eq!(results[1].depth, 1);
    assert!(results.iter().all(|r| r.success));
}

#[tokio::test]
async fn test_cosine_extraction_with_builtin_extractor() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><body><main>
        <p>The async runtime schedules tasks.</p>
        <p>Bread recipes for the weekend.</p>
        <p>Tuning an async runtime.</p>
        </main></body></html>"#,
    )
    .await;

    let client = http_client();
    let mut request = CrawlRequest::new(format!("{}/", server.uri()));
    request.fetch.extraction = ExtractionOptions {
        strategy: ExtractionStrategy::Cosine,
        semantic_filter: Some("async runtime".to_string()),
        ..ExtractionOptions::default()
    };
    let events = run(&client, request).await;

    let result = results(&events)[0];
    assert!(result.success, "{:?}", result.error);
    let blocks = result
        .extracted_content
        .as_ref()
        .and_then(|content| content.as_array())
        .expect("cosine extraction yields a list of blocks");
    assert_eq!(blocks.len(), 2);
    assert!(blocks
        .iter()
        .all(|block| block["content"].as_str().unwrap().contains("async runtime")));
}

#[tokio::test]
async fn test_config_driven_crawl_is_stored() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><body><main><a href="/a">A</a><a href="/missing">Missing</a></main></body></html>"#,
    )
    .await;
    mount_page(&server, "/a", "<html><head><title>A</title></head></html>").await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("trawl.db");
    let config_path = dir.path().join("trawl.toml");
    let mut file = std::fs::File::create(&config_path).unwrap();
    write!(
        file,
        r#"
[crawl]
url = "{}/"
max-depth = 1
enable-deep-crawl = true

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[retry]
max-retries = 1

[output]
database-path = "{}"
"#,
        server.uri(),
        db_path.display()
    )
    .unwrap();
    drop(file);

    let (config, hash) = load_config_with_hash(&config_path).unwrap();
    let request = config.to_request();
    let client = ReqwestFetchClient::new(&config.user_agent, &config.client).unwrap();
    let storage = SqliteStorage::new(&db_path).unwrap();
    let mut sink = StorageSink::start(storage, &request.url, &hash).unwrap();
    let run_id = sink.run_id();

    let mut stream = Coordinator::new(&client, request)
        .with_retry_policy(config.retry_policy())
        .run();
    while let Some(event) = stream.next().await {
        sink.handle(&event).unwrap();
    }
    drop(stream);
    drop(sink);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.id, run_id);
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, hash);
    assert_eq!(run.pages_total, Some(3));
    assert_eq!(storage.count_results(run_id, Some(true)).unwrap(), 2);
    assert_eq!(storage.count_results(run_id, Some(false)).unwrap(), 1);

    let errors = storage.get_error_summary(run_id).unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].0.contains("404"));
}

// ===== Properties over generated sites =====

/// Endless site: every page links to ten children and a "next" page
struct EndlessSite;

#[async_trait]
impl FetchClient for EndlessSite {
    async fn fetch(&self, url: &str, _options: &FetchOptions) -> Result<FetchedPage, FetchFailure> {
        let id: u64 = url
            .rsplit('/')
            .next()
            .and_then(|segment| segment.parse().ok())
            .unwrap_or(0);

        let links: String = (1..=10)
            .map(|i| format!(r#"<a href="/p/{}">child</a>"#, id * 10 + i))
            .collect();
        let body = format!(
            r#"<html><head><link rel="next" href="/p/{}"></head>
            <body><main>{}<a href="/p/{}">self</a></main></body></html>"#,
            id + 1_000_000,
            links,
            id
        );

        Ok(FetchedPage {
            status_code: Some(200),
            html: body,
            ..FetchedPage::default()
        })
    }
}

fn assert_run_properties(events: &[CrawlEvent], request: &CrawlRequest) {
    assert!(matches!(events.first(), Some(CrawlEvent::SiteMap(_))));
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, CrawlEvent::Finished(_)))
            .count(),
        1
    );

    // every result is immediately followed by its progress update
    let body = &events[1..events.len() - 1];
    assert_eq!(body.len() % 2, 0);
    for (i, pair) in body.chunks(2).enumerate() {
        assert!(matches!(pair[0], CrawlEvent::Result(_)));
        match &pair[1] {
            CrawlEvent::Progress(progress) => {
                assert_eq!(progress.completed, i + 1);
                assert!(progress.total >= progress.completed);
            }
            other => panic!("Expected Progress, got {:?}", other),
        }
    }

    let results = results(events);
    assert!(results.len() <= request.max_urls);
    assert!(results.iter().all(|r| r.depth <= request.max_depth));

    let mut seen = HashSet::new();
    for result in &results {
        assert!(seen.insert(frontier_key(&result.url)), "visited twice: {}", result.url);
    }

    assert_eq!(finished_total(events), results.len());
}

#[tokio::test]
async fn test_budget_depth_and_uniqueness_hold() {
    for (max_depth, max_urls) in [(0, 10), (1, 5), (2, 17), (3, 50), (5, 1)] {
        let mut request = CrawlRequest::new("https://site.test/p/1");
        request.enable_pagination = true;
        request.enable_deep_crawl = true;
        request.max_depth = max_depth;
        request.max_urls = max_urls;

        let events = run(&EndlessSite, request.clone()).await;
        assert_run_properties(&events, &request);

        let expected = if max_depth == 0 { 1 } else { max_urls };
        assert_eq!(results(&events).len(), expected);
    }
}

#[tokio::test]
async fn test_pagination_cycle_terminates() {
    struct Cycle;

    #[async_trait]
    impl FetchClient for Cycle {
        async fn fetch(
            &self,
            url: &str,
            _options: &FetchOptions,
        ) -> Result<FetchedPage, FetchFailure> {
            let next = if url.ends_with("/a") { "/b" } else { "/a" };
            Ok(FetchedPage {
                html: format!(r#"<a rel="next" href="{}">next</a>"#, next),
                ..FetchedPage::default()
            })
        }
    }

    let mut request = CrawlRequest::new("https://site.test/a");
    request.enable_pagination = true;
    request.max_depth = 10;
    let events = run(&Cycle, request.clone()).await;

    assert_run_properties(&events, &request);
    let urls: Vec<_> = results(&events).iter().map(|r| r.url.as_str()).collect();
    assert_eq!(urls, vec!["https://site.test/a", "https://site.test/b"]);
}

/// Fails with the given message a number of times, then succeeds
struct Flaky {
    message: &'static str,
    failures: u32,
    calls: AtomicU32,
}

impl Flaky {
    fn new(message: &'static str, failures: u32) -> Self {
        Self {
            message,
            failures,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl FetchClient for Flaky {
    async fn fetch(
        &self,
        _url: &str,
        _options: &FetchOptions,
    ) -> Result<FetchedPage, FetchFailure> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(FetchFailure::new(self.message))
        } else {
            Ok(FetchedPage {
                html: "<p>ok</p>".to_string(),
                ..FetchedPage::default()
            })
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_message_delays_retry() {
    let client = Flaky::new("rate limit, retry after 2 seconds", 1);
    let started = tokio::time::Instant::now();

    let events = run(&client, CrawlRequest::new("https://site.test/")).await;

    assert!(started.elapsed() >= Duration::from_secs(2));
    assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    let result = results(&events)[0];
    assert!(result.success);
    assert_eq!(result.retries, 1);
}

#[tokio::test(start_paused = true)]
async fn test_retries_are_capped() {
    let client = Flaky::new("HTTP 429 Too Many Requests", u32::MAX);

    let events = Coordinator::new(&client, CrawlRequest::new("https://site.test/"))
        .with_retry_policy(RetryPolicy::new(2, Duration::from_millis(100)))
        .run()
        .collect::<Vec<_>>()
        .await;

    assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    let result = results(&events)[0];
    assert!(!result.success);
    assert_eq!(result.retries, 2);
    assert!(result.error.as_deref().unwrap_or_default().contains("2 retries"));
    assert_eq!(finished_total(&events), 1);
}

#[tokio::test]
async fn test_fatal_failure_is_not_retried() {
    let client = Flaky::new("Connection refused", u32::MAX);

    let events = run(&client, CrawlRequest::new("https://site.test/")).await;

    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    assert!(!results(&events)[0].success);
}
