//! Output module for crawl reports
//!
//! This module handles:
//! - Summarising a batch against the lookup cache
//! - Exporting the URLs that failed to yield content or a date

mod failed;
pub mod stats;

pub use failed::{failed_urls, write_failed_urls};
pub use stats::{print_report, CrawlReport};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
