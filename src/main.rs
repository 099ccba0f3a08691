//! Evidence-Crawler main entry point
//!
//! This is the command-line interface for crawling evidence pages into a
//! lookup cache.

use anyhow::{Context, Result};
use clap::Parser;
use evidence_crawler::config::{load_config_with_hash, validate, Config};
use evidence_crawler::output::{print_report, write_failed_urls, CrawlReport};
use evidence_crawler::storage::read_entries;
use evidence_crawler::url::{parse_request, parse_url_list};
use evidence_crawler::PageCrawler;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Evidence-Crawler: a polite, resumable evidence page crawler
///
/// Fetches every URL in the input list while respecting robots.txt and
/// per-domain crawl delays, and records the extracted text and publish date
/// in a CSV lookup cache. URLs already in the cache are never fetched again.
#[derive(Parser, Debug)]
#[command(name = "evidence-crawler")]
#[command(version)]
#[command(about = "A polite, resumable evidence page crawler", long_about = None)]
struct Cli {
    /// File with one URL per line ('#' comments and blank lines are ignored)
    #[arg(value_name = "URLS", required_unless_present = "stats")]
    urls: Option<PathBuf>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Lookup cache file (overrides [cache] path)
    #[arg(long, value_name = "FILE")]
    cache: Option<PathBuf>,

    /// Number of crawl workers (overrides [crawler] num-threads)
    #[arg(short, long, value_name = "N")]
    threads: Option<usize>,

    /// Write URLs missing content or date to this file, one per line
    #[arg(long, value_name = "FILE")]
    failed_out: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate inputs and show what would be crawled without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics of the existing lookup cache and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = load_effective_config(&cli)?;

    if cli.stats {
        return handle_stats(&config);
    }

    let urls_path = cli
        .urls
        .as_deref()
        .context("A URL list is required unless --stats is given")?;
    let content = std::fs::read_to_string(urls_path)
        .with_context(|| format!("Failed to read URL list {}", urls_path.display()))?;
    let urls = parse_url_list(&content);
    tracing::info!("Read {} URLs from {}", urls.len(), urls_path.display());

    if cli.dry_run {
        return handle_dry_run(&config, &urls);
    }

    handle_crawl(&config, &urls, cli.failed_out.as_deref()).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("evidence_crawler=info,warn"),
            1 => EnvFilter::new("evidence_crawler=debug,info"),
            2 => EnvFilter::new("evidence_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the configuration file, if any, and applies command-line overrides
fn load_effective_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            Config::default()
        }
    };

    if let Some(cache) = &cli.cache {
        config.cache.path = cache.clone();
    }
    if let Some(threads) = cli.threads {
        config.crawler.num_threads = threads;
    }

    validate(&config).context("Invalid configuration")?;
    Ok(config)
}

/// Loads cached entries without creating or repairing the cache file
fn existing_entries(path: &Path) -> Result<HashMap<String, evidence_crawler::CacheEntry>> {
    read_entries(path).with_context(|| format!("Failed to load lookup cache {}", path.display()))
}

/// Handles the --dry-run mode: validates inputs and shows what would be crawled
fn handle_dry_run(config: &Config, urls: &[String]) -> Result<()> {
    println!("=== Evidence-Crawler Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Workers: {}", config.crawler.num_threads);
    println!(
        "  Default crawl delay: {}ms",
        config.crawler.default_crawl_delay_ms
    );
    println!("  Robots agent: {}", config.crawler.robots_agent);
    println!("  User agent: {}", config.user_agent.header_value());
    println!("  Lookup cache: {}", config.cache.path.display());

    let entries = existing_entries(&config.cache.path)?;

    let mut unique = HashSet::new();
    let mut domains = HashSet::new();
    let mut cached = 0usize;
    let mut invalid = Vec::new();
    for url in urls {
        if !unique.insert(url.as_str()) {
            continue;
        }
        if entries.contains_key(url) {
            cached += 1;
            continue;
        }
        match parse_request(url) {
            Ok((_, domain)) => {
                domains.insert(domain);
            }
            Err(e) => invalid.push(e.to_string()),
        }
    }

    println!("\nInput:");
    println!("  URLs: {} ({} distinct)", urls.len(), unique.len());
    println!("  Already cached: {}", cached);
    println!(
        "  To crawl: {} across {} domains",
        unique.len() - cached,
        domains.len()
    );

    if !invalid.is_empty() {
        println!("\nInvalid URLs ({}), recorded as empty:", invalid.len());
        for error in &invalid {
            println!("  - {}", error);
        }
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: reports on the existing lookup cache
fn handle_stats(config: &Config) -> Result<()> {
    println!("Lookup cache: {}\n", config.cache.path.display());

    let entries = existing_entries(&config.cache.path)?;
    print_report(&CrawlReport::from_cache(&entries));
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, urls: &[String], failed_out: Option<&Path>) -> Result<()> {
    let crawler = PageCrawler::from_config(config).context("Failed to start the crawler")?;

    crawler
        .crawl_pages(urls.iter().cloned())
        .await
        .context("Crawl did not complete cleanly")?;

    let entries = crawler.entries();
    let submitted = || urls.iter().map(String::as_str);

    let report = CrawlReport::from_entries(submitted(), &entries);
    print_report(&report);

    if let Some(path) = failed_out {
        let written = write_failed_urls(submitted(), &entries, path)
            .with_context(|| format!("Failed to write failed URLs to {}", path.display()))?;
        println!("\nStored {} failed URLs in '{}'", written, path.display());
    }

    Ok(())
}
