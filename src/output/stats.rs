//! Crawl statistics
//!
//! A [`CrawlReport`] summarises how a batch of URLs fared against the lookup
//! cache. A URL counts as failed when it has no content or no publish date,
//! since downstream evidence needs both.

use crate::storage::CacheEntry;
use std::collections::{HashMap, HashSet};

/// Summary of a crawled batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Number of distinct URLs submitted
    pub submitted: usize,

    /// URLs with extracted text
    pub with_content: usize,

    /// URLs without extracted text
    pub missing_content: usize,

    /// URLs without a publish date
    pub missing_date: usize,

    /// URLs missing content or date
    pub failed: usize,

    /// URLs without any cache entry (the batch did not complete)
    pub not_crawled: usize,
}

impl CrawlReport {
    /// Builds the report of `urls` against the crawler's entries
    ///
    /// Duplicate URLs are counted once.
    pub fn from_entries<'a, I>(urls: I, entries: &HashMap<String, CacheEntry>) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut report = Self::default();
        let mut seen = HashSet::new();

        for url in urls {
            if !seen.insert(url) {
                continue;
            }
            report.submitted += 1;

            let Some(entry) = entries.get(url) else {
                report.not_crawled += 1;
                report.missing_content += 1;
                report.missing_date += 1;
                report.failed += 1;
                continue;
            };

            if entry.has_content() {
                report.with_content += 1;
            } else {
                report.missing_content += 1;
            }
            if !entry.has_date() {
                report.missing_date += 1;
            }
            if is_failed(entry) {
                report.failed += 1;
            }
        }

        report
    }

    /// Builds the report over every entry of a lookup cache
    pub fn from_cache(entries: &HashMap<String, CacheEntry>) -> Self {
        Self::from_entries(entries.keys().map(String::as_str), entries)
    }

    /// Share of submitted URLs that failed, between 0 and 1
    pub fn failure_rate(&self) -> f64 {
        if self.submitted == 0 {
            0.0
        } else {
            self.failed as f64 / self.submitted as f64
        }
    }
}

/// Returns true if the entry lacks content or a date
pub fn is_failed(entry: &CacheEntry) -> bool {
    !entry.has_content() || !entry.has_date()
}

/// Prints a report to stdout
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Report ===\n");
    println!("  Submitted URLs:   {}", report.submitted);
    println!("  With content:     {}", report.with_content);
    println!("  Missing content:  {}", report.missing_content);
    println!("  Missing date:     {}", report.missing_date);
    if report.not_crawled > 0 {
        println!("  Not crawled:      {}", report.not_crawled);
    }
    println!();
    println!(
        "Failed to fetch content or date for {} out of {} pages ({:.1}%)",
        report.failed,
        report.submitted,
        report.failure_rate() * 100.0
    );
}
