//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that coordinates one run:
//! - Seeding the frontier (seed URL, optional sitemap URLs)
//! - Pacing rate-limit-sensitive fetches
//! - Fetching through the retry policy
//! - Following pagination successors and in-page links
//! - Streaming events to the caller
//!
//! The run is a lazy stream. Nothing happens until it is polled, the loop
//! advances only as fast as the caller consumes events, and dropping the
//! stream cancels any in-flight fetch or sleep.

use crate::crawler::events::{
    CrawlEvent, FinishedSummary, ProgressUpdate, SiteMapSummary, SiteStructure,
};
use crate::crawler::request::CrawlRequest;
use crate::crawler::result::CrawlResult;
use crate::crawler::retry::RetryPolicy;
use crate::crawler::scheduler::{FrontierEntry, Origin, Pacer, Scheduler};
use crate::discovery::{LinkDiscoverer, PaginationDetector, PaginationOutcome};
use crate::fetch::FetchClient;
use crate::url::same_site;
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;
use std::time::Duration;

/// Maximum number of new deep-crawl links taken from one page
pub const MAX_LINKS_PER_PAGE: usize = 20;

/// Main crawler coordinator structure
///
/// Holds a borrowed fetch client and the policy for one run. Independent
/// coordinators may share the same client concurrently.
pub struct Coordinator<'a> {
    client: &'a dyn FetchClient,
    request: CrawlRequest,
    retry: RetryPolicy,
    pagination: PaginationDetector,
    links: LinkDiscoverer,
}

impl<'a> Coordinator<'a> {
    /// Creates a coordinator with the default retry policy
    ///
    /// # Arguments
    ///
    /// * `client` - The fetch client, owned by the caller
    /// * `request` - The crawl policy
    pub fn new(client: &'a dyn FetchClient, request: CrawlRequest) -> Self {
        Self {
            client,
            request,
            retry: RetryPolicy::default(),
            pagination: PaginationDetector::new(),
            links: LinkDiscoverer::new(),
        }
    }

    /// Replaces the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn request(&self) -> &CrawlRequest {
        &self.request
    }

    /// Starts the run, returning its event stream
    ///
    /// The stream yields one `SiteMap`, a `Result` and a `Progress` per page,
    /// and ends after exactly one `Finished`.
    pub fn run(self) -> BoxStream<'a, CrawlEvent> {
        stream::unfold(Driver::new(self), |mut driver| async move {
            let event = driver.next_event().await?;
            Some((event, driver))
        })
        .boxed()
    }
}

/// Mutable state of one run
#[derive(Debug)]
struct CrawlRunState {
    scheduler: Scheduler,
    pacer: Option<Pacer>,
    completed: usize,
    site_structure: SiteStructure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    Crawling,
    Done,
}

/// Advances a run one event at a time
struct Driver<'a> {
    coordinator: Coordinator<'a>,
    state: CrawlRunState,
    pending: VecDeque<CrawlEvent>,
    phase: Phase,
}

impl<'a> Driver<'a> {
    fn new(coordinator: Coordinator<'a>) -> Self {
        let request = &coordinator.request;
        let pacer = request
            .is_rate_limit_sensitive()
            .then(|| Pacer::new(Duration::from_millis(request.delay_ms)));

        let state = CrawlRunState {
            scheduler: Scheduler::new(request.max_depth, request.max_urls),
            pacer,
            completed: 0,
            site_structure: SiteStructure::new(request.url.clone(), &[]),
        };

        Self {
            coordinator,
            state,
            pending: VecDeque::new(),
            phase: Phase::Start,
        }
    }

    async fn next_event(&mut self) -> Option<CrawlEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }

            match self.phase {
                Phase::Start => {
                    self.phase = Phase::Crawling;
                    return Some(self.start().await);
                }
                Phase::Crawling => {
                    if !self.crawl_next().await {
                        self.phase = Phase::Done;
                        return Some(self.finish());
                    }
                }
                Phase::Done => return None,
            }
        }
    }

    /// Seeds the frontier and builds the `SiteMap` event
    async fn start(&mut self) -> CrawlEvent {
        let request = &self.coordinator.request;
        let seed = request.url.clone();

        tracing::info!(
            "Starting crawl of {} (max depth {}, max urls {}, pagination {}, deep crawl {})",
            seed,
            request.max_depth,
            request.max_urls,
            request.enable_pagination,
            request.enable_deep_crawl
        );

        if let Err(rejection) = self
            .state
            .scheduler
            .enqueue(FrontierEntry::new(seed.clone(), 0, Origin::Direct))
        {
            tracing::warn!("Seed {} not queued: {:?}", seed, rejection);
        }

        let sitemap_urls = if request.wants_sitemap() {
            match self.coordinator.client.discover_sitemap(&seed).await {
                Ok(urls) => urls,
                Err(e) => {
                    tracing::warn!("Sitemap discovery failed for {}: {}", seed, e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let request = &self.coordinator.request;
        if request.max_depth >= 1 {
            let mut added = 0;
            for url in &sitemap_urls {
                if self.state.scheduler.remaining_capacity() == 0 {
                    break;
                }
                if request.same_domain_only && same_site(&seed, url) == Some(false) {
                    continue;
                }
                if self
                    .state
                    .scheduler
                    .enqueue(FrontierEntry::new(url.clone(), 1, Origin::Sitemap))
                    .is_ok()
                {
                    added += 1;
                }
            }
            if added > 0 {
                tracing::info!("Queued {} of {} sitemap URLs", added, sitemap_urls.len());
            }
        }

        self.state.site_structure = SiteStructure::new(seed.clone(), &sitemap_urls);

        CrawlEvent::SiteMap(SiteMapSummary {
            base_url: seed,
            sitemap_available: !sitemap_urls.is_empty(),
            sitemap_urls_count: sitemap_urls.len(),
            site_structure: self.state.site_structure.clone(),
        })
    }

    /// Processes one frontier entry, queueing its `Result` and `Progress`
    ///
    /// Returns false once the frontier is empty or the budget is spent.
    async fn crawl_next(&mut self) -> bool {
        let Some(entry) = self.state.scheduler.next_entry() else {
            return false;
        };

        tracing::debug!(
            "Processing URL: {} (depth {}, {})",
            entry.url,
            entry.depth,
            entry.origin.as_str()
        );

        if let Some(pacer) = &self.state.pacer {
            pacer.wait().await;
        }

        let coordinator = &self.coordinator;
        let mut result = coordinator
            .retry
            .attempt(coordinator.client, &entry.url, &coordinator.request.fetch)
            .await
            .at(entry.depth, entry.origin);

        if let Some(pacer) = &mut self.state.pacer {
            pacer.record_completion();
        }

        self.state.completed += 1;
        if !result.success {
            tracing::debug!(
                "Failed {}: {}",
                entry.url,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }

        let pagination = self.detect_pagination(&result);
        result.pagination_info = pagination.clone();
        let links = self.discover_links(&result, &entry);

        let scheduler = &self.state.scheduler;
        let progress = ProgressUpdate {
            completed: self.state.completed,
            total: scheduler.frontier_size() + self.state.completed,
            crawled: scheduler.visited_count(),
        };
        self.pending.push_back(CrawlEvent::Result(Box::new(result)));
        self.pending.push_back(CrawlEvent::Progress(progress));

        if let Some(next_url) = pagination.and_then(|outcome| outcome.next_page_url) {
            match self
                .state
                .scheduler
                .enqueue_pagination(&entry.url, &next_url, entry.depth + 1)
            {
                Ok(()) => tracing::debug!("Following pagination {} -> {}", entry.url, next_url),
                Err(rejection) => {
                    tracing::trace!("Pagination {} not queued: {:?}", next_url, rejection)
                }
            }
        }

        self.enqueue_links(links, &entry);

        true
    }

    /// Runs pagination detection on a successful page when enabled
    fn detect_pagination(&self, result: &CrawlResult) -> Option<PaginationOutcome> {
        if !self.coordinator.request.enable_pagination {
            return None;
        }
        let html = result.html()?;

        let outcome = self.coordinator.pagination.detect(html, page_url(result));
        if let Some(error) = &outcome.error {
            tracing::warn!("Pagination detection failed for {}: {}", result.url, error);
        }
        Some(outcome)
    }

    /// Discovers deep-crawl candidates on a successful page below max depth
    fn discover_links(&self, result: &CrawlResult, entry: &FrontierEntry) -> Vec<String> {
        let request = &self.coordinator.request;
        if !request.enable_deep_crawl || entry.depth >= request.max_depth {
            return Vec::new();
        }
        let Some(html) = result.html() else {
            return Vec::new();
        };

        match self.coordinator.links.discover(html, page_url(result)) {
            Ok(links) => links,
            Err(e) => {
                tracing::warn!("Link discovery failed for {}: {}", result.url, e);
                Vec::new()
            }
        }
    }

    fn enqueue_links(&mut self, links: Vec<String>, entry: &FrontierEntry) {
        let request = &self.coordinator.request;
        let scheduler = &mut self.state.scheduler;
        let mut added = 0;

        for link in links {
            if added >= MAX_LINKS_PER_PAGE || scheduler.remaining_capacity() == 0 {
                break;
            }
            // unresolvable origins are accepted
            if request.same_domain_only && same_site(&request.url, &link) == Some(false) {
                continue;
            }
            if scheduler
                .enqueue(FrontierEntry::new(link, entry.depth + 1, Origin::DeepCrawl))
                .is_ok()
            {
                added += 1;
            }
        }

        if added > 0 {
            tracing::debug!("Queued {} links from {}", added, entry.url);
        }
    }

    fn finish(&mut self) -> CrawlEvent {
        tracing::info!(
            "Crawl of {} finished: {} pages, {} left in frontier",
            self.coordinator.request.url,
            self.state.completed,
            self.state.scheduler.frontier_size()
        );

        CrawlEvent::Finished(FinishedSummary {
            total: self.state.completed,
            site_structure: self.state.site_structure.clone(),
            timestamp: Utc::now(),
        })
    }
}

/// URL relative links on a page resolve against
fn page_url(result: &CrawlResult) -> &str {
    result.final_url.as_deref().unwrap_or(&result.url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::FetchOptions;
    use crate::fetch::{FetchFailure, FetchedPage};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory site: URL -> HTML, anything else is a 404
    struct StaticSite {
        pages: HashMap<String, String>,
        sitemap: Vec<String>,
    }

    impl StaticSite {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(url, html)| (url.to_string(), html.to_string()))
                    .collect(),
                sitemap: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl FetchClient for StaticSite {
        async fn fetch(
            &self,
            url: &str,
            _options: &FetchOptions,
        ) -> Result<FetchedPage, FetchFailure> {
            match self.pages.get(url) {
                Some(html) => Ok(FetchedPage {
                    status_code: Some(200),
                    html: html.clone(),
                    ..FetchedPage::default()
                }),
                None => Err(FetchFailure::with_status("HTTP 404 Not Found", 404)),
            }
        }

        async fn discover_sitemap(&self, _seed: &str) -> Result<Vec<String>, FetchFailure> {
            Ok(self.sitemap.clone())
        }
    }

    async fn collect(client: &dyn FetchClient, request: CrawlRequest) -> Vec<CrawlEvent> {
        Coordinator::new(client, request).run().collect().await
    }

    fn results(events: &[CrawlEvent]) -> Vec<&CrawlResult> {
        events.iter().filter_map(CrawlEvent::as_result).collect()
    }

    #[tokio::test]
    async fn test_single_seed() {
        let site = StaticSite::new(&[("https://example.test/", "<a href='/a'>a</a>")]);
        let mut request = CrawlRequest::new("https://example.test/");
        request.max_depth = 0;
        request.max_urls = 1;

        let events = collect(&site, request).await;
        let kinds: Vec<&str> = events.iter().map(CrawlEvent::kind).collect();
        assert_eq!(kinds, vec!["site_map", "result", "progress", "finished"]);

        let result = events[1].as_result().unwrap();
        assert!(result.success);
        assert_eq!(result.depth, 0);
        assert_eq!(result.source, Origin::Direct);
        assert!(matches!(&events[3], CrawlEvent::Finished(f) if f.total == 1));
    }

    #[tokio::test]
    async fn test_rel_next_followed() {
        let site = StaticSite::new(&[
            ("https://example.test/a", "<a rel='next' href='/b'>next</a>"),
            ("https://example.test/b", "<p>end</p>"),
        ]);
        let mut request = CrawlRequest::new("https://example.test/a");
        request.enable_pagination = true;
        request.max_urls = 5;

        let events = collect(&site, request).await;
        let results = results(&events);
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].url, "https://example.test/b");
        assert_eq!(results[1].depth, 1);
        assert_eq!(results[1].source, Origin::Pagination);

        let info = results[0].pagination_info.as_ref().unwrap();
        assert_eq!(info.next_page_url.as_deref(), Some("https://example.test/b"));
    }

    #[tokio::test]
    async fn test_pagination_self_loop_terminates() {
        let site = StaticSite::new(&[(
            "https://example.test/loop",
            "<a rel='next' href='/loop'>again</a>",
        )]);
        let mut request = CrawlRequest::new("https://example.test/loop");
        request.enable_pagination = true;
        request.max_depth = 100;
        request.max_urls = 100;

        let events = collect(&site, request).await;
        assert_eq!(results(&events).len(), 1);
    }

    #[tokio::test]
    async fn test_failed_page_counts_and_stops() {
        let site = StaticSite::new(&[]);
        let mut request = CrawlRequest::new("https://example.test/missing");
        request.enable_deep_crawl = true;
        request.enable_pagination = true;

        let events = collect(&site, request).await;
        let results = results(&events);
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert_eq!(results[0].retries, 0);
        assert!(matches!(events.last(), Some(CrawlEvent::Finished(f)) if f.total == 1));
    }

    #[tokio::test]
    async fn test_deep_crawl_scoped_and_capped() {
        let mut links = String::from("<main><a href='https://elsewhere.test/x'>x</a>");
        for i in 0..30 {
            links.push_str(&format!("<a href='/p{}'>p</a>", i));
        }
        links.push_str("</main>");

        let site = StaticSite::new(&[("https://example.test/", links.as_str())]);
        let mut request = CrawlRequest::new("https://example.test/");
        request.enable_deep_crawl = true;
        request.max_depth = 1;
        request.max_urls = 100;

        let events = collect(&site, request).await;
        let results = results(&events);
        assert_eq!(results.len(), 1 + MAX_LINKS_PER_PAGE);
        assert!(results[1..].iter().all(|r| r.source == Origin::DeepCrawl));
        assert!(results.iter().all(|r| !r.url.contains("elsewhere")));
    }

    #[tokio::test]
    async fn test_sitemap_seeds_frontier() {
        let mut site = StaticSite::new(&[
            ("https://example.test/", "<p>home</p>"),
            ("https://example.test/blog/1", "<p>post</p>"),
        ]);
        site.sitemap = vec![
            "https://example.test/blog/1".to_string(),
            "https://other.test/blog/2".to_string(),
        ];
        let mut request = CrawlRequest::new("https://example.test/");
        request.enable_deep_crawl = true;

        let events = collect(&site, request).await;
        match &events[0] {
            CrawlEvent::SiteMap(summary) => {
                assert!(summary.sitemap_available);
                assert_eq!(summary.sitemap_urls_count, 2);
                let groups = summary.site_structure.sitemap.as_ref().unwrap();
                assert_eq!(groups["/blog"].len(), 2);
            }
            other => panic!("expected site_map, got {}", other.kind()),
        }

        let results = results(&events);
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].source, Origin::Sitemap);
        assert_eq!(results[1].depth, 1);
    }

    #[tokio::test]
    async fn test_progress_follows_each_result() {
        let site = StaticSite::new(&[
            ("https://example.test/", "<main><a href='/a'>a</a><a href='/b'>b</a></main>"),
            ("https://example.test/a", "<p>a</p>"),
            ("https://example.test/b", "<p>b</p>"),
        ]);
        let mut request = CrawlRequest::new("https://example.test/");
        request.enable_deep_crawl = true;

        let events = collect(&site, request).await;
        let progress: Vec<ProgressUpdate> = events
            .iter()
            .filter_map(|e| match e {
                CrawlEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .collect();

        assert_eq!(progress.len(), 3);
        assert_eq!(progress[0].completed, 1);
        assert_eq!(progress[0].total, 1);
        assert_eq!(progress[1].total, 3);
        assert_eq!(progress[2].completed, 3);
        assert_eq!(progress[2].crawled, 3);

        for pair in events[1..events.len() - 1].chunks(2) {
            assert_eq!(pair[0].kind(), "result");
            assert_eq!(pair[1].kind(), "progress");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_sensitive_fetches_are_paced() {
        let site = StaticSite::new(&[
            ("https://example.test/", "<main><a href='/a'>a</a></main>"),
            ("https://example.test/a", "<p>a</p>"),
        ]);
        let mut request = CrawlRequest::new("https://example.test/");
        request.enable_deep_crawl = true;
        request.delay_ms = 1500;
        request.fetch.extraction.strategy = crate::crawler::ExtractionStrategy::LlmBased;

        let start = tokio::time::Instant::now();
        let events = collect(&site, request).await;
        assert_eq!(results(&events).len(), 2);
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_stream_is_lazy() {
        struct Unreachable;

        #[async_trait]
        impl FetchClient for Unreachable {
            async fn fetch(
                &self,
                url: &str,
                _options: &FetchOptions,
            ) -> Result<FetchedPage, FetchFailure> {
                panic!("fetched {} before being polled", url);
            }
        }

        let client = Unreachable;
        let mut stream =
            Coordinator::new(&client, CrawlRequest::new("https://example.test/")).run();
        let first = stream.next().await.unwrap();
        assert_eq!(first.kind(), "site_map");
        drop(stream);
    }

    /// Endless chain /0 -> /1 -> ... where every fetch takes 100ms
    #[derive(Default)]
    struct SlowChain {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl FetchClient for SlowChain {
        async fn fetch(
            &self,
            url: &str,
            _options: &FetchOptions,
        ) -> Result<FetchedPage, FetchFailure> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;

            let id: u32 = url
                .rsplit('/')
                .next()
                .and_then(|segment| segment.parse().ok())
                .unwrap_or(0);
            Ok(FetchedPage {
                status_code: Some(200),
                html: format!("<main><a href='/{}'>next</a></main>", id + 1),
                ..FetchedPage::default()
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_stream_stops_fetching() {
        let site = SlowChain::default();
        let mut request = CrawlRequest::new("https://example.test/0");
        request.enable_deep_crawl = true;
        request.max_depth = 100;
        request.max_urls = 100;

        let mut stream = Coordinator::new(&site, request).run();
        let kinds: Vec<&str> = stream.by_ref().take(5).map(|e| e.kind()).collect().await;
        assert_eq!(kinds, vec!["site_map", "result", "progress", "result", "progress"]);
        assert_eq!(site.fetches.load(Ordering::SeqCst), 2);

        // Leave the third fetch in flight
        let pending = tokio::time::timeout(Duration::from_millis(10), stream.next()).await;
        assert!(pending.is_err());
        assert_eq!(site.fetches.load(Ordering::SeqCst), 3);

        drop(stream);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(site.fetches.load(Ordering::SeqCst), 3);
    }
}
