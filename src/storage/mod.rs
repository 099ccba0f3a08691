//! Storage module for persisting crawl results
//!
//! Every crawled URL is recorded as one row of a `url,content,date` CSV file.
//! The file is only ever appended to, so it doubles as a crash log: reloading
//! it restores exactly the results that were committed before an interruption.

mod error;
mod lookup;

pub use error::{StorageError, StorageResult};
pub use lookup::{load_entries, read_entries, LookupCache, LOOKUP_HEADER};

/// A crawled URL and what was extracted from it
///
/// Missing content or date (a disallowed URL, a failed fetch, a page without a
/// recognisable date) is `None`. Empty strings are normalised to `None`, since
/// the file format cannot tell the two apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub url: String,
    pub content: Option<String>,
    pub date: Option<String>,
}

impl CacheEntry {
    pub fn new(url: impl Into<String>, content: Option<String>, date: Option<String>) -> Self {
        Self {
            url: url.into(),
            content: content.filter(|c| !c.is_empty()),
            date: date.filter(|d| !d.is_empty()),
        }
    }

    /// An entry recording that nothing could be retrieved for `url`
    pub fn empty(url: impl Into<String>) -> Self {
        Self::new(url, None, None)
    }

    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    pub fn has_date(&self) -> bool {
        self.date.is_some()
    }
}
