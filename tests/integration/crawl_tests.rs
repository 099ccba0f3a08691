//! Integration tests for the crawler
//!
//! These tests use wiremock to serve robots.txt (and, for the end-to-end
//! test, the pages themselves) and a recording fetcher to observe when the
//! crawler hits each domain.

use async_trait::async_trait;
use evidence_crawler::config::Config;
use evidence_crawler::crawler::CrawlSettings;
use evidence_crawler::{
    CacheEntry, DomainPolicy, FetchedPage, LookupCache, PageCrawler, PageFetcher, RobotsResolver,
};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Fetcher that records the start time of every fetch
struct RecordingFetcher {
    fetches: Mutex<Vec<(String, Instant)>>,
}

impl RecordingFetcher {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            fetches: Mutex::new(Vec::new()),
        })
    }

    fn count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }

    /// Fetch start times of URLs starting with `prefix`, in order
    fn starts_for(&self, prefix: &str) -> Vec<Instant> {
        let mut starts: Vec<Instant> = self
            .fetches
            .lock()
            .unwrap()
            .iter()
            .filter(|(url, _)| url.starts_with(prefix))
            .map(|(_, at)| *at)
            .collect();
        starts.sort();
        starts
    }
}

#[async_trait]
impl PageFetcher for RecordingFetcher {
    async fn fetch(&self, url: &str) -> FetchedPage {
        self.fetches
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));
        FetchedPage::new(Some(format!("text of {}", url)), Some("2022-02-22".to_string()))
    }
}

/// Mock server answering robots.txt (HEAD and GET) with `body`
async fn robots_server(body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;
    server
}

fn resolver(timeout: Duration) -> RobotsResolver {
    RobotsResolver::new("TestBot/1.0", "http", timeout).expect("Failed to build resolver")
}

fn open_crawler(
    cache_path: &Path,
    fetcher: Arc<RecordingFetcher>,
    threads: usize,
    delay: Duration,
) -> PageCrawler {
    let mut settings = CrawlSettings::new(cache_path, threads);
    settings.default_crawl_delay = delay;
    PageCrawler::open(settings, fetcher, resolver(Duration::from_secs(2)))
        .expect("Failed to open crawler")
}

async fn robots_requests(server: &MockServer, verb: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == "/robots.txt")
        .filter(|request| request.method.to_string() == verb)
        .count()
}

#[tokio::test]
async fn test_cached_urls_are_not_fetched() {
    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("lookup.csv");

    // robots.txt must not be requested either
    let server = MockServer::start().await;
    Mock::given(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let urls: Vec<String> = (0..3).map(|i| format!("{}/cached/{}", server.uri(), i)).collect();
    {
        let (cache, _) = LookupCache::open(&cache_path).unwrap();
        for url in &urls {
            cache
                .append(&CacheEntry::new(url.as_str(), Some("old".into()), None))
                .unwrap();
        }
    }

    let fetcher = RecordingFetcher::new();
    let crawler = open_crawler(&cache_path, Arc::clone(&fetcher), 3, Duration::from_millis(10));
    crawler.crawl_pages(urls.clone()).await.unwrap();

    assert_eq!(fetcher.count(), 0);
    for url in &urls {
        assert_eq!(crawler.content_of(url).as_deref(), Some("old"));
        assert_eq!(crawler.publish_date_of(url), None);
    }
}

#[tokio::test]
async fn test_per_domain_spacing() {
    let dir = TempDir::new().unwrap();
    let server = robots_server("User-agent: *\nAllow: /").await;
    let delay = Duration::from_millis(300);

    let fetcher = RecordingFetcher::new();
    let crawler = open_crawler(&dir.path().join("lookup.csv"), Arc::clone(&fetcher), 4, delay);

    let urls: Vec<String> = (0..4).map(|i| format!("{}/page/{}", server.uri(), i)).collect();
    crawler.crawl_pages(urls).await.unwrap();

    let starts = fetcher.starts_for(&server.uri());
    assert_eq!(starts.len(), 4);
    for pair in starts.windows(2) {
        let gap = pair[1].duration_since(pair[0]);
        assert!(
            gap >= delay - Duration::from_millis(50),
            "fetches only {:?} apart",
            gap
        );
    }
}

#[tokio::test]
async fn test_robots_crawl_delay_is_honoured() {
    let dir = TempDir::new().unwrap();
    let server = robots_server("User-agent: *\nCrawl-delay: 0.4").await;

    let fetcher = RecordingFetcher::new();
    let crawler = open_crawler(
        &dir.path().join("lookup.csv"),
        Arc::clone(&fetcher),
        2,
        Duration::from_millis(10),
    );

    let urls: Vec<String> = (0..2).map(|i| format!("{}/d/{}", server.uri(), i)).collect();
    crawler.crawl_pages(urls).await.unwrap();

    let starts = fetcher.starts_for(&server.uri());
    assert_eq!(starts.len(), 2);
    assert!(starts[1].duration_since(starts[0]) >= Duration::from_millis(350));
}

#[tokio::test]
async fn test_repeat_crawl_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("lookup.csv");
    let server = robots_server("User-agent: *\nAllow: /").await;

    let fetcher = RecordingFetcher::new();
    let crawler = open_crawler(&cache_path, Arc::clone(&fetcher), 2, Duration::from_millis(10));

    let urls: Vec<String> = (0..3).map(|i| format!("{}/a/{}", server.uri(), i)).collect();
    crawler.crawl_pages(urls.clone()).await.unwrap();
    let first_file = std::fs::read_to_string(&cache_path).unwrap();
    let first_entries = crawler.entries();

    crawler.crawl_pages(urls).await.unwrap();

    assert_eq!(fetcher.count(), 3);
    assert_eq!(crawler.entries(), first_entries);
    assert_eq!(std::fs::read_to_string(&cache_path).unwrap(), first_file);
}

#[tokio::test]
async fn test_disallowed_paths_are_not_fetched_or_delayed() {
    let dir = TempDir::new().unwrap();
    let server = robots_server("User-agent: *\nDisallow: /secret/").await;

    let fetcher = RecordingFetcher::new();
    let crawler = open_crawler(
        &dir.path().join("lookup.csv"),
        Arc::clone(&fetcher),
        1,
        Duration::from_secs(2),
    );

    let urls: Vec<String> = (0..3).map(|i| format!("{}/secret/{}", server.uri(), i)).collect();
    let started = Instant::now();
    crawler.crawl_pages(urls.clone()).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(fetcher.count(), 0);
    for url in &urls {
        assert_eq!(crawler.entry(url), Some(CacheEntry::empty(url.as_str())));
    }
}

#[tokio::test]
async fn test_unreachable_robots_denies_domain() {
    let dir = TempDir::new().unwrap();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let domain = listener.local_addr().unwrap().to_string();
    drop(listener);

    let fetcher = RecordingFetcher::new();
    let crawler = open_crawler(
        &dir.path().join("lookup.csv"),
        Arc::clone(&fetcher),
        2,
        Duration::from_millis(10),
    );

    crawler
        .crawl_pages([format!("http://{}/one", domain)])
        .await
        .unwrap();
    crawler
        .crawl_pages([format!("http://{}/two", domain)])
        .await
        .unwrap();

    assert_eq!(fetcher.count(), 0);
    assert!(matches!(crawler.policy_of(&domain), Some(DomainPolicy::Faulty)));
    assert_eq!(crawler.content_of(&format!("http://{}/two", domain)), None);
    assert!(crawler.visit_state_of(&domain).is_none());
}

#[tokio::test]
async fn test_robots_timeout_is_resolved_once() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let fetcher = RecordingFetcher::new();
    let mut settings = CrawlSettings::new(dir.path().join("lookup.csv"), 3);
    settings.default_crawl_delay = Duration::from_millis(10);
    let crawler = PageCrawler::open(
        settings,
        Arc::clone(&fetcher) as Arc<dyn PageFetcher>,
        resolver(Duration::from_millis(500)),
    )
    .unwrap();

    let urls: Vec<String> = (0..3).map(|i| format!("{}/t/{}", server.uri(), i)).collect();
    crawler.crawl_pages(urls.clone()).await.unwrap();
    crawler
        .crawl_pages([format!("{}/later", server.uri())])
        .await
        .unwrap();

    assert_eq!(fetcher.count(), 0);
    assert_eq!(robots_requests(&server, "HEAD").await, 1);
    assert_eq!(robots_requests(&server, "GET").await, 0);
    assert!(matches!(
        crawler.policy_of(&server.address().to_string()),
        Some(DomainPolicy::Faulty)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_urls_across_domains() {
    let dir = TempDir::new().unwrap();
    let mut servers = Vec::new();
    for _ in 0..5 {
        servers.push(robots_server("User-agent: *\nAllow: /").await);
    }

    let delay = Duration::from_millis(100);
    let fetcher = RecordingFetcher::new();
    let crawler = open_crawler(&dir.path().join("lookup.csv"), Arc::clone(&fetcher), 7, delay);

    let urls: Vec<String> = (0..100)
        .map(|i| format!("{}/item/{}", servers[i % 5].uri(), i))
        .collect();
    crawler.crawl_pages(urls.clone()).await.unwrap();

    assert_eq!(fetcher.count(), 100);
    assert_eq!(crawler.len(), 100);
    for url in &urls {
        assert_eq!(crawler.content_of(url), Some(format!("text of {}", url)));
    }

    for server in &servers {
        assert_eq!(robots_requests(server, "HEAD").await, 1);
        assert_eq!(robots_requests(server, "GET").await, 1);

        let starts = fetcher.starts_for(&server.uri());
        assert_eq!(starts.len(), 20);
        for pair in starts.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= delay - Duration::from_millis(50));
        }
    }

    let reloaded = LookupCache::load(&dir.path().join("lookup.csv")).unwrap();
    assert_eq!(reloaded, crawler.entries());
}

#[tokio::test]
async fn test_restart_from_cache_file() {
    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("lookup.csv");
    let server = robots_server("User-agent: *\nAllow: /").await;
    let urls: Vec<String> = (0..3).map(|i| format!("{}/r/{}", server.uri(), i)).collect();

    let first = RecordingFetcher::new();
    {
        let crawler = open_crawler(&cache_path, Arc::clone(&first), 2, Duration::from_millis(10));
        crawler.crawl_pages(urls.clone()).await.unwrap();
    }
    assert_eq!(first.count(), 3);

    let second = RecordingFetcher::new();
    let crawler = open_crawler(&cache_path, Arc::clone(&second), 2, Duration::from_millis(10));
    crawler.crawl_pages(urls.clone()).await.unwrap();

    assert_eq!(second.count(), 0);
    for url in &urls {
        assert_eq!(crawler.content_of(url), Some(format!("text of {}", url)));
        assert_eq!(crawler.publish_date_of(url).as_deref(), Some("2022-02-22"));
    }
}

#[tokio::test]
async fn test_restart_after_torn_write() {
    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("lookup.csv");
    let server = robots_server("User-agent: *\nAllow: /").await;
    let done = format!("{}/done", server.uri());
    let torn = format!("{}/torn", server.uri());

    std::fs::write(
        &cache_path,
        format!("url,content,date\n{},kept,2020-01-01\n{},\"half writ", done, torn),
    )
    .unwrap();

    let fetcher = RecordingFetcher::new();
    let crawler = open_crawler(&cache_path, Arc::clone(&fetcher), 2, Duration::from_millis(10));
    crawler
        .crawl_pages(vec![done.clone(), torn.clone()])
        .await
        .unwrap();

    assert_eq!(fetcher.count(), 1);
    assert_eq!(crawler.content_of(&done).as_deref(), Some("kept"));

    let reloaded = LookupCache::load(&cache_path).unwrap();
    assert_eq!(reloaded.len(), 2);
    assert_eq!(
        reloaded[&torn].content,
        Some(format!("text of {}", torn))
    );
}

#[tokio::test]
async fn test_end_to_end_with_http_fetcher() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/news/story"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><meta property="article:published_time" content="2019-09-09T08:00:00Z"></head>
            <body><nav><p>Home</p></nav>
            <article><h1>Rates held</h1><p>The central bank kept rates unchanged.</p></article>
            </body></html>"#,
        ))
        .mount(&server)
        .await;

    let mut config = Config::default();
    config.cache.path = dir.path().join("lookup.csv");
    config.crawler.robots_scheme = "http".to_string();
    config.crawler.default_crawl_delay_ms = 10;
    config.crawler.num_threads = 2;
    config.fetcher.timeout_secs = 5;
    config.fetcher.fallback_timeout_secs = 5;

    let crawler = PageCrawler::from_config(&config).unwrap();
    let story = format!("{}/news/story", server.uri());
    crawler.crawl_pages([story.clone()]).await.unwrap();

    assert_eq!(
        crawler.content_of(&story).as_deref(),
        Some("Rates held\nThe central bank kept rates unchanged.")
    );
    assert_eq!(crawler.publish_date_of(&story).as_deref(), Some("2019-09-09"));
    assert!(matches!(
        crawler.policy_of(&server.address().to_string()),
        Some(DomainPolicy::Fetchable(_))
    ));
}
