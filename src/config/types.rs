use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Evidence-Crawler
///
/// Every section is optional; missing sections and keys fall back to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub fetcher: FetcherConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub cache: CacheConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Number of concurrent crawl workers
    #[serde(rename = "num-threads")]
    pub num_threads: usize,

    /// Crawl delay applied when robots.txt gives none (milliseconds)
    #[serde(rename = "default-crawl-delay-ms")]
    pub default_crawl_delay_ms: u64,

    /// User-agent token used when querying robots.txt rules
    #[serde(rename = "robots-agent")]
    pub robots_agent: String,

    /// Scheme used to reach robots.txt
    #[serde(rename = "robots-scheme")]
    pub robots_scheme: String,

    /// Timeout for the robots.txt HEAD and GET requests (seconds)
    #[serde(rename = "robots-timeout-secs")]
    pub robots_timeout_secs: u64,
}

impl CrawlerConfig {
    pub fn default_crawl_delay(&self) -> Duration {
        Duration::from_millis(self.default_crawl_delay_ms)
    }

    pub fn robots_timeout(&self) -> Duration {
        Duration::from_secs(self.robots_timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            num_threads: 7,
            default_crawl_delay_ms: 1000,
            robots_agent: "*".to_string(),
            robots_scheme: "https".to_string(),
            robots_timeout_secs: 10,
        }
    }
}

/// Page fetching configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Timeout for the primary extraction request (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Timeout for the browser-like fallback request (seconds)
    #[serde(rename = "fallback-timeout-secs")]
    pub fallback_timeout_secs: u64,

    /// A single extracted line longer than this is treated as markup leakage
    #[serde(rename = "max-single-paragraph-chars")]
    pub max_single_paragraph_chars: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            fallback_timeout_secs: 120,
            max_single_paragraph_chars: 10_000,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the identifying user agent: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "EvidenceCrawler".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.org/crawler".to_string(),
            contact_email: "crawler@example.org".to_string(),
        }
    }
}

/// Lookup cache configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Path to the url,content,date CSV file
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("crawled_pages.csv"),
        }
    }
}
