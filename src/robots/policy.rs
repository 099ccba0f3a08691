//! Per-domain crawl policies
//!
//! A domain resolves to exactly one [`DomainPolicy`] for the lifetime of the
//! process. Only the fetchable variant carries rules, so a crawl delay can
//! never be requested for a domain whose robots.txt could not be resolved.

use crate::robots::ParsedRobots;
use std::time::Duration;

/// Rules for a domain that may be crawled
#[derive(Debug, Clone)]
pub enum FetchRules {
    /// Rules parsed from the domain's robots.txt
    Robots(ParsedRobots),

    /// No robots.txt exists: everything is allowed at the standard delay
    DefaultAllow,
}

impl FetchRules {
    /// Checks whether the rules allow fetching `url` as `agent`
    pub fn can_fetch(&self, url: &str, agent: &str) -> bool {
        match self {
            Self::Robots(robots) => robots.is_allowed(url, agent),
            Self::DefaultAllow => true,
        }
    }

    /// Returns the delay to keep between fetches against the domain
    ///
    /// `standard` applies when robots.txt does not specify a delay.
    pub fn crawl_delay(&self, agent: &str, standard: Duration) -> Duration {
        match self {
            Self::Robots(robots) => robots.crawl_delay(agent).unwrap_or(standard),
            Self::DefaultAllow => standard,
        }
    }
}

/// Resolved policy for a domain
#[derive(Debug, Clone)]
pub enum DomainPolicy {
    /// The domain may be crawled subject to its rules
    Fetchable(FetchRules),

    /// Resolving robots.txt failed; nothing on the domain is fetched again
    Faulty,
}

impl DomainPolicy {
    /// Returns the domain's rules if `url` may be fetched
    ///
    /// This is the only way to reach [`FetchRules::crawl_delay`] from a policy.
    pub fn admit(&self, url: &str, agent: &str) -> Option<&FetchRules> {
        match self {
            Self::Fetchable(rules) if rules.can_fetch(url, agent) => Some(rules),
            _ => None,
        }
    }

    /// Checks whether `url` may be fetched as `agent`
    pub fn can_fetch(&self, url: &str, agent: &str) -> bool {
        self.admit(url, agent).is_some()
    }

    /// Returns the rules of a fetchable domain
    pub fn rules(&self) -> Option<&FetchRules> {
        match self {
            Self::Fetchable(rules) => Some(rules),
            Self::Faulty => None,
        }
    }

    pub fn is_faulty(&self) -> bool {
        matches!(self, Self::Faulty)
    }
}
