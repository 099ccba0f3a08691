//! Robots.txt handling module
//!
//! This module fetches and parses robots.txt files and turns them into a
//! [`DomainPolicy`]. Resolution never fails: a missing robots.txt yields the
//! default-allow policy, and any error while fetching yields the deny-all
//! policy so that a misbehaving host is not hit again.

mod parser;
mod policy;

pub use parser::ParsedRobots;
pub use policy::{DomainPolicy, FetchRules};

use crate::config::Config;
use reqwest::Client;
use std::time::Duration;

/// Resolves the crawl policy of a domain from its robots.txt
#[derive(Debug, Clone)]
pub struct RobotsResolver {
    client: Client,
    scheme: String,
}

impl RobotsResolver {
    /// Creates a resolver
    ///
    /// # Arguments
    ///
    /// * `user_agent` - The user agent header sent with robots.txt requests
    /// * `scheme` - `https` in production; `http` is useful against local servers
    /// * `timeout` - Timeout for each of the HEAD and GET requests
    pub fn new(user_agent: &str, scheme: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            scheme: scheme.to_string(),
        })
    }

    /// Creates a resolver from the crawler configuration
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Self::new(
            &config.user_agent.header_value(),
            &config.crawler.robots_scheme,
            config.crawler.robots_timeout(),
        )
    }

    /// Returns the robots.txt location for a domain
    pub fn robots_url(&self, domain: &str) -> String {
        format!("{}://{}/robots.txt", self.scheme, domain)
    }

    /// Resolves the policy for a domain
    ///
    /// 1. HEAD robots.txt; a status of 400 or above means there is none
    ///    and the default-allow policy applies
    /// 2. Otherwise GET and parse it
    /// 3. Any transport error yields the deny-all policy
    pub async fn resolve(&self, domain: &str) -> DomainPolicy {
        let robots_url = self.robots_url(domain);

        match self.fetch_robots(&robots_url).await {
            Ok(Some(robots)) => {
                tracing::debug!("Parsed robots.txt for {}", domain);
                DomainPolicy::Fetchable(FetchRules::Robots(robots))
            }
            Ok(None) => {
                tracing::warn!(
                    "No robots.txt found at '{}'. Using default crawl rules for {}",
                    robots_url,
                    domain
                );
                DomainPolicy::Fetchable(FetchRules::DefaultAllow)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to fetch rules from '{}': {}. Skipping {} henceforth",
                    robots_url,
                    e,
                    domain
                );
                DomainPolicy::Faulty
            }
        }
    }

    async fn fetch_robots(&self, robots_url: &str) -> Result<Option<ParsedRobots>, reqwest::Error> {
        let head = self.client.head(robots_url).send().await?;
        if head.status().as_u16() >= 400 {
            return Ok(None);
        }

        let response = self.client.get(robots_url).send().await?;
        if !response.status().is_success() {
            return Ok(None);
        }

        let body = response.text().await?;
        Ok(Some(ParsedRobots::from_content(&body)))
    }
}
