//! Crawler module for page fetching and batch coordination
//!
//! This module contains the core crawling logic, including:
//! - Page fetching with a primary and a fallback extraction strategy
//! - HTML text extraction and publish date guessing
//! - The shared work queue drained by the worker pool
//! - Batch coordination with per-domain politeness

mod coordinator;
mod dates;
mod fetcher;
mod parser;
mod scheduler;

pub use coordinator::{CrawlSettings, PageCrawler};
pub use dates::{find_date, find_date_at, normalize_date};
pub use fetcher::{build_browser_client, build_http_client, FetchedPage, HttpPageFetcher, PageFetcher};
pub use parser::{extract_main_content, remove_boilerplate};
pub use scheduler::{WorkItem, WorkQueue};
