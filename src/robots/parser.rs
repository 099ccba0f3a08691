//! Robots.txt parser implementation
//!
//! Allow/Disallow matching is delegated to the robotstxt crate; Crawl-delay,
//! which that crate does not expose, is read from the raw directives here.

use crate::state::MAX_CRAWL_DELAY;
use robotstxt::DefaultMatcher;
use std::time::Duration;

/// Parsed robots.txt data
///
/// Wraps the raw robots.txt body. Matching is done on demand, since the
/// robotstxt matcher works directly on the body text.
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    content: String,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }

    /// Returns the raw robots.txt content
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute URL to check
    /// * `user_agent` - The user agent token (`*` matches only wildcard groups)
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Gets the crawl delay for a specific user agent
    ///
    /// A group naming the agent takes precedence over the `*` group. Values
    /// that are negative or not finite are ignored, and values above
    /// [`MAX_CRAWL_DELAY`] are capped.
    ///
    /// # Returns
    ///
    /// * `Some(Duration)` - The crawl delay
    /// * `None` - If no usable crawl delay applies to the agent
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        let normalized_agent = user_agent.trim().to_lowercase();

        let mut group_agents: Vec<String> = Vec::new();
        // Consecutive User-agent lines share one group; any other directive closes the list.
        let mut collecting_agents = false;
        let mut delay_for_wildcard: Option<f64> = None;
        let mut delay_for_agent: Option<f64> = None;

        for line in self.content.lines() {
            let directive = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = directive.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    if !collecting_agents {
                        group_agents.clear();
                        collecting_agents = true;
                    }
                    group_agents.push(value.to_lowercase());
                }
                "crawl-delay" => {
                    collecting_agents = false;
                    let Ok(delay) = value.parse::<f64>() else {
                        continue;
                    };
                    for agent in &group_agents {
                        if agent == "*" {
                            delay_for_wildcard.get_or_insert(delay);
                        } else if normalized_agent != "*" && normalized_agent.contains(agent.as_str()) {
                            delay_for_agent.get_or_insert(delay);
                        }
                    }
                }
                _ => collecting_agents = false,
            }
        }

        delay_for_agent
            .or(delay_for_wildcard)
            .filter(|secs| secs.is_finite())
            .and_then(|secs| Duration::try_from_secs_f64(secs.min(MAX_CRAWL_DELAY.as_secs_f64())).ok())
    }
}
