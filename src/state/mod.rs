//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase`: Where a single URL is in the crawl (pending, fetching, done, ...)
//! - `DomainVisitState`: Per-domain last visit and crawl delay for politeness

mod domain_state;
mod page_state;

pub use domain_state::{DomainVisitState, MAX_CRAWL_DELAY};
pub use page_state::CrawlPhase;
