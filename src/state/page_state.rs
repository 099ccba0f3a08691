/// Phase definitions for a URL moving through the crawler
use std::fmt;

/// Represents where a URL is in the crawl process
///
/// Phases only move forward. `Done` is terminal and is backed by an entry in
/// the lookup cache, which is why a finished URL is never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CrawlPhase {
    /// Queued and waiting for a worker
    Pending,

    /// Waiting for the domain's robots.txt policy
    ResolvingPolicy,

    /// Sleeping until the domain's crawl delay has elapsed
    RateLimitedWait,

    /// The page fetch is in flight
    Fetching,

    /// A cache entry exists for the URL
    Done,
}

impl CrawlPhase {
    /// Returns true if this is the terminal phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true while the URL holds a worker
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Pending | Self::Done)
    }

    /// Checks whether moving to `next` is a valid transition
    ///
    /// Any phase may jump straight to `Done` (cached, denied or failed URLs),
    /// otherwise phases advance one step at a time.
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == Self::Done || next == self.successor()
    }

    fn successor(&self) -> CrawlPhase {
        match self {
            Self::Pending => Self::ResolvingPolicy,
            Self::ResolvingPolicy => Self::RateLimitedWait,
            Self::RateLimitedWait => Self::Fetching,
            Self::Fetching | Self::Done => Self::Done,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::ResolvingPolicy => "resolving_policy",
            Self::RateLimitedWait => "rate_limited_wait",
            Self::Fetching => "fetching",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
