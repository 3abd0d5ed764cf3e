//! Sumi-Trawl main entry point
//!
//! This is the command-line interface for the Sumi-Trawl site crawler.

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use sumi_trawl::config::{load_config_with_hash, Config};
use sumi_trawl::crawler::{CrawlEvent, Coordinator};
use sumi_trawl::fetch::ReqwestFetchClient;
use sumi_trawl::output::{
    load_statistics, print_statistics, EventSink, JsonLinesWriter, StorageSink,
};
use sumi_trawl::storage::{RunStatus, SqliteStorage};
use tracing_subscriber::EnvFilter;

/// Sumi-Trawl: a bounded, streaming site crawler
///
/// Sumi-Trawl walks a site outward from a seed URL, following pagination
/// chains and in-page links within a depth limit and a page budget, and
/// writes one JSON event per line as pages are processed.
#[derive(Parser, Debug)]
#[command(name = "sumi-trawl")]
#[command(version = "1.0.0")]
#[command(about = "A bounded, streaming site crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics of the latest run from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
        Ok(())
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(&config, &config_hash).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr; stdout is reserved for events.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_trawl=info,warn"),
            1 => EnvFilter::new("sumi_trawl=debug,info"),
            2 => EnvFilter::new("sumi_trawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    let request = config.to_request();

    println!("=== Sumi-Trawl Dry Run ===\n");

    println!("Crawl:");
    println!("  Seed: {}", request.url);
    println!("  Max depth: {}", request.max_depth);
    println!("  Max URLs: {}", request.max_urls);
    println!("  Pagination: {}", enabled(request.enable_pagination));
    println!("  Deep crawl: {}", enabled(request.enable_deep_crawl));
    println!("  Same domain only: {}", request.same_domain_only);
    println!("  Sitemap discovery: {}", enabled(request.wants_sitemap()));

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);
    if let Some(user_agent) = &request.fetch.user_agent {
        println!("  Override: {}", user_agent);
    }

    println!("\nClient:");
    println!("  Timeout: {}s", config.client.timeout_secs);
    println!("  Max redirects: {}", config.client.max_redirects);
    println!("  Respect robots.txt: {}", config.client.respect_robots);
    if let Some(proxy) = &request.fetch.proxy {
        println!("  Proxy: {}", proxy);
    }

    println!("\nExtraction:");
    println!("  Strategy: {}", request.fetch.extraction.strategy.as_str());
    if let Some(filter) = &request.fetch.extraction.semantic_filter {
        println!("  Semantic filter: {}", filter);
    }
    if request.is_rate_limit_sensitive() {
        println!("  Delay between pages: {}ms", request.delay_ms);
    }
    println!("  Chunking: {:?}", request.fetch.chunking.strategy);
    println!(
        "  Retries: {} (default delay {}ms)",
        config.retry.max_retries, config.retry.default_delay_ms
    );

    println!("\nOutput:");
    println!(
        "  Events: {}",
        config.output.events_path.as_deref().unwrap_or("stdout")
    );
    println!(
        "  Database: {}",
        config.output.database_path.as_deref().unwrap_or("(none)")
    );

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would visit at most {} pages starting at {}",
        request.max_urls, request.url
    );
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<()> {
    let database_path = config
        .output
        .database_path
        .as_deref()
        .context("--stats requires [output] database-path")?;

    println!("Database: {}\n", database_path);

    let storage = SqliteStorage::new(Path::new(database_path))
        .with_context(|| format!("Failed to open database {}", database_path))?;

    match load_statistics(&storage)? {
        Some(stats) => print_statistics(&stats),
        None => println!("No crawl runs found in database"),
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, config_hash: &str) -> Result<()> {
    let request = config.to_request();
    let client = ReqwestFetchClient::new(&config.user_agent, &config.client)
        .context("Failed to build HTTP client")?;

    let strategy = request.fetch.extraction.strategy;
    if !client.supports(strategy) {
        anyhow::bail!(
            "Extraction strategy '{}' has no extractor (built in: css_selector, cosine)",
            strategy.as_str()
        );
    }

    let mut store = match &config.output.database_path {
        Some(path) => {
            let storage = SqliteStorage::new(Path::new(path))
                .with_context(|| format!("Failed to open database {}", path))?;
            Some(StorageSink::start(storage, &request.url, config_hash)?)
        }
        None => None,
    };

    let mut events: Box<dyn EventSink> = match &config.output.events_path {
        Some(path) => Box::new(
            JsonLinesWriter::create(Path::new(path))
                .with_context(|| format!("Failed to create events file {}", path))?,
        ),
        None => Box::new(JsonLinesWriter::stdout()),
    };

    let mut stream = Coordinator::new(&client, request)
        .with_retry_policy(config.retry_policy())
        .run();

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        let event = tokio::select! {
            event = stream.next() => event,
            _ = &mut interrupt => {
                tracing::warn!("Interrupted, stopping crawl");
                if let Some(store) = store.as_mut() {
                    store.abandon(RunStatus::Interrupted)?;
                }
                events.finish()?;
                return Ok(());
            }
        };

        let Some(event) = event else {
            break;
        };

        if let CrawlEvent::Finished(summary) = &event {
            tracing::info!("Crawl finished: {} pages processed", summary.total);
        }

        events.handle(&event)?;
        if let Some(store) = store.as_mut() {
            store.handle(&event)?;
        }
    }

    events.finish()?;
    Ok(())
}
