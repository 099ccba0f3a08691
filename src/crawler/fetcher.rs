//! Page fetching
//!
//! [`PageFetcher`] is the seam between the crawler and the network. The
//! default [`HttpPageFetcher`] runs two extraction strategies:
//! - primary: the crawler's identifying client, main-content extraction
//! - fallback: a browser-like client, boilerplate removal over the whole page
//!
//! The fallback only runs when the primary result is degenerate. Neither
//! strategy reports errors; anything that goes wrong yields missing data.

use crate::config::{Config, FetcherConfig, UserAgentConfig};
use crate::crawler::dates::find_date;
use crate::crawler::parser::{extract_main_content, remove_boilerplate};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{redirect::Policy, Client};
use std::time::Duration;

/// Browser identity presented by the fallback strategy
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36";

const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,\
    image/avif,image/webp,image/apng,*/*;q=0.8";

const BROWSER_ACCEPT_LANGUAGE: &str = "en-GB,en;q=0.5";

const MAX_REDIRECTS: usize = 10;

/// Text and publish date extracted from a page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedPage {
    pub content: Option<String>,
    pub publish_date: Option<String>,
}

impl FetchedPage {
    pub fn new(content: Option<String>, publish_date: Option<String>) -> Self {
        Self {
            content: content.filter(|c| !c.trim().is_empty()),
            publish_date,
        }
    }

    /// A page from which nothing could be retrieved
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns true if the extraction is unusable
    ///
    /// That is the case when there is no content, or when the content is a
    /// single line longer than `max_single_paragraph_chars` (markup or script
    /// text that leaked through extraction).
    pub fn is_degenerate(&self, max_single_paragraph_chars: usize) -> bool {
        match &self.content {
            None => true,
            Some(content) => {
                let mut lines = content.lines();
                match (lines.next(), lines.next()) {
                    (Some(only), None) => only.chars().count() > max_single_paragraph_chars,
                    _ => false,
                }
            }
        }
    }
}

/// Retrieves the text and publish date of a page
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `url`; failures are reported as missing content
    async fn fetch(&self, url: &str) -> FetchedPage;
}

/// Builds the crawler's identifying HTTP client
///
/// The user agent follows `CrawlerName/Version (+ContactURL; ContactEmail)` so
/// site operators can tell who is crawling them.
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Builds the browser-like client used by the fallback strategy
pub fn build_browser_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(BROWSER_ACCEPT_LANGUAGE));

    Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .default_headers(headers)
        .timeout(timeout)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// The default [`PageFetcher`], backed by `reqwest` and `scraper`
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
    browser_client: Client,
    max_single_paragraph_chars: usize,
}

impl HttpPageFetcher {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let FetcherConfig {
            timeout_secs,
            fallback_timeout_secs,
            max_single_paragraph_chars,
        } = config.fetcher;

        Ok(Self {
            client: build_http_client(&config.user_agent, Duration::from_secs(timeout_secs))?,
            browser_client: build_browser_client(Duration::from_secs(fallback_timeout_secs))?,
            max_single_paragraph_chars,
        })
    }

    /// Main-content extraction with the identifying client
    async fn fetch_primary(&self, url: &str) -> FetchedPage {
        let html = match self.download(&self.client, url).await {
            Some(html) => html,
            None => return FetchedPage::empty(),
        };

        FetchedPage::new(extract_main_content(&html), find_date(&html))
    }

    /// Boilerplate removal with the browser-like client
    async fn fetch_fallback(&self, url: &str) -> FetchedPage {
        let response = match self.browser_client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Fallback request for {} failed: {}", url, e);
                return FetchedPage::empty();
            }
        };

        let status = response.status();
        if status.as_u16() >= 300 {
            tracing::debug!("Fallback request for {} returned HTTP {}", url, status);
            return FetchedPage::empty();
        }

        match response.text().await {
            Ok(html) => FetchedPage::new(remove_boilerplate(&html), find_date(&html)),
            Err(e) => {
                tracing::debug!("Failed to read fallback body of {}: {}", url, e);
                FetchedPage::empty()
            }
        }
    }

    async fn download(&self, client: &Client, url: &str) -> Option<String> {
        let response = match client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Request for {} failed: {}", url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!("Request for {} returned HTTP {}", url, response.status());
            return None;
        }

        response.text().await.ok()
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> FetchedPage {
        let primary = self.fetch_primary(url).await;
        if !primary.is_degenerate(self.max_single_paragraph_chars) {
            tracing::debug!("Extracted {} with the primary strategy", url);
            return primary;
        }

        tracing::debug!("Primary extraction of {} was degenerate, falling back", url);
        self.fetch_fallback(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PROSE: &str = "The committee published its findings on Tuesday, and said that the \
        evidence it had gathered over the past two years showed that the scheme had not been \
        managed well by the department that was responsible for it.";

    fn test_config() -> Config {
        let mut config = Config::default();
        config.fetcher.timeout_secs = 5;
        config.fetcher.fallback_timeout_secs = 5;
        config.fetcher.max_single_paragraph_chars = 500;
        config
    }

    #[test]
    fn test_degenerate_detection() {
        assert!(FetchedPage::empty().is_degenerate(10));
        assert!(FetchedPage::new(Some("   ".to_string()), None).is_degenerate(10));
        assert!(FetchedPage::new(Some("x".repeat(11)), None).is_degenerate(10));
        assert!(!FetchedPage::new(Some("x".repeat(10)), None).is_degenerate(10));

        let two_lines = format!("{}\n{}", "x".repeat(20), "y".repeat(20));
        assert!(!FetchedPage::new(Some(two_lines), None).is_degenerate(10));
    }

    #[test]
    fn test_build_clients() {
        assert!(build_http_client(&UserAgentConfig::default(), Duration::from_secs(5)).is_ok());
        assert!(build_browser_client(Duration::from_secs(5)).is_ok());
    }

    #[tokio::test]
    async fn test_primary_strategy() {
        let server = MockServer::start().await;
        let html = format!(
            r#"<html><head><meta property="article:published_time" content="2021-04-01"></head>
            <body><nav><p>Menu</p></nav><article><p>{PROSE}</p><p>Second.</p></article></body></html>"#
        );
        Mock::given(method("GET"))
            .and(path("/story"))
            .respond_with(ResponseTemplate::new(200).set_body_string(html))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpPageFetcher::new(&test_config()).unwrap();
        let page = fetcher.fetch(&format!("{}/story", server.uri())).await;

        assert_eq!(page.content, Some(format!("{PROSE}\nSecond.")));
        assert_eq!(page.publish_date.as_deref(), Some("2021-04-01"));
    }

    #[tokio::test]
    async fn test_degenerate_primary_uses_fallback() {
        let server = MockServer::start().await;
        let html = format!(
            "<html><body><p>{}</p><div><p>{PROSE}</p><p>{PROSE}</p></div></body></html>",
            "z".repeat(600)
        );
        // Serves the oversize paragraph to the crawler UA, real prose to browsers
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header_exists("accept-language"))
            .respond_with(ResponseTemplate::new(200).set_body_string(html))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(format!("<html><body><p>{}</p></body></html>", "z".repeat(600))),
            )
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpPageFetcher::new(&test_config()).unwrap();
        let page = fetcher.fetch(&format!("{}/page", server.uri())).await;

        assert_eq!(page.content, Some(format!("{PROSE}\n{PROSE}")));
    }

    #[tokio::test]
    async fn test_fallback_error_status_yields_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_string("<p>not found</p>"))
            .expect(2)
            .mount(&server)
            .await;

        let fetcher = HttpPageFetcher::new(&test_config()).unwrap();
        let page = fetcher.fetch(&format!("{}/gone", server.uri())).await;

        assert_eq!(page, FetchedPage::empty());
    }

    #[tokio::test]
    async fn test_unreachable_host_yields_nothing() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = HttpPageFetcher::new(&test_config()).unwrap();
        let page = fetcher.fetch(&format!("http://{}/", addr)).await;

        assert_eq!(page, FetchedPage::empty());
    }
}
