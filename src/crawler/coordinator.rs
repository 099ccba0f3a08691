//! Crawler coordinator - batch orchestration
//!
//! A [`PageCrawler`] owns the lookup cache and the per-domain state, and runs
//! each batch of URLs over a fixed pool of worker tasks. For every URL a
//! worker:
//! 1. skips it if it is already cached
//! 2. resolves the domain's robots policy (once per domain per process)
//! 3. records disallowed URLs as empty entries, without fetching
//! 4. reserves the domain's next fetch slot and sleeps until it
//! 5. fetches the page and commits the result to memory and disk
//!
//! All shared maps live behind one mutex. The lock is never held across a
//! network request or a politeness sleep. It is held while an entry is
//! appended and synced to the lookup file, so that blocking write runs on a
//! runtime thread and commits are serialised.
//!
//! Every mutation of the shared maps is an insert or a monotonic update, so a
//! worker that panics while holding the lock leaves them consistent and the
//! lock is recovered rather than treated as poisoned.

use crate::config::Config;
use crate::crawler::fetcher::{HttpPageFetcher, PageFetcher};
use crate::crawler::scheduler::{WorkItem, WorkQueue};
use crate::robots::{DomainPolicy, RobotsResolver};
use crate::state::{CrawlPhase, DomainVisitState};
use crate::storage::{CacheEntry, LookupCache};
use crate::url::parse_request;
use crate::{CrawlerError, Result};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::task::JoinError;
use tokio::time::Instant;

/// Settings of a [`PageCrawler`]
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Location of the `url,content,date` lookup file
    pub cache_path: PathBuf,

    /// Number of concurrent workers per batch
    pub num_threads: usize,

    /// Agent token used when querying robots rules
    pub robots_agent: String,

    /// Delay between fetches when robots.txt does not set one
    pub default_crawl_delay: Duration,
}

impl CrawlSettings {
    /// Settings with the standard agent token and a one second delay
    pub fn new(cache_path: impl Into<PathBuf>, num_threads: usize) -> Self {
        Self {
            cache_path: cache_path.into(),
            num_threads,
            robots_agent: "*".to_string(),
            default_crawl_delay: Duration::from_secs(1),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            cache_path: config.cache.path.clone(),
            num_threads: config.crawler.num_threads,
            robots_agent: config.crawler.robots_agent.clone(),
            default_crawl_delay: config.crawler.default_crawl_delay(),
        }
    }
}

/// Maps shared by every worker, guarded together
#[derive(Default)]
struct SharedState {
    /// Every URL with a result, loaded from the lookup file and extended as
    /// workers commit
    entries: HashMap<String, CacheEntry>,

    /// Domain → policy cell; a cell is initialised by the first worker that
    /// needs the domain while later ones wait on it
    policies: HashMap<String, Arc<OnceCell<DomainPolicy>>>,

    /// Domain → politeness bookkeeping, present for every fetchable domain
    visits: HashMap<String, DomainVisitState>,

    /// URLs a worker has claimed but not committed yet
    in_flight: HashSet<String>,
}

/// State and collaborators shared between the crawler handle and its workers
struct CrawlContext {
    settings: CrawlSettings,
    fetcher: Arc<dyn PageFetcher>,
    resolver: RobotsResolver,
    cache: LookupCache,
    state: Mutex<SharedState>,
}

/// Follows one URL through its phases, logging each transition
struct PhaseTracker<'a> {
    url: &'a str,
    phase: CrawlPhase,
}

impl<'a> PhaseTracker<'a> {
    fn new(url: &'a str) -> Self {
        Self {
            url,
            phase: CrawlPhase::Pending,
        }
    }

    fn advance(&mut self, next: CrawlPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "invalid phase transition {} -> {}",
            self.phase,
            next
        );
        tracing::trace!("{}: {} -> {}", self.url, self.phase, next);
        self.phase = next;
    }
}

/// Polite, resumable, concurrent page crawler
///
/// Results are keyed by the exact URL string submitted. Once a URL has an
/// entry, even an empty one, it is never fetched again, including across
/// restarts since every entry is appended to the lookup file.
pub struct PageCrawler {
    inner: Arc<CrawlContext>,
    /// Serialises overlapping `crawl_pages` calls on the same crawler
    batch_lock: tokio::sync::Mutex<()>,
}

impl PageCrawler {
    /// Opens the crawler, loading previous results from the lookup file
    ///
    /// # Returns
    ///
    /// * `Ok(PageCrawler)` - The crawler, with every cached URL marked done
    /// * `Err(CrawlerError)` - The lookup file could not be read or created
    pub fn open(
        settings: CrawlSettings,
        fetcher: Arc<dyn PageFetcher>,
        resolver: RobotsResolver,
    ) -> Result<Self> {
        let (cache, entries) = LookupCache::open(&settings.cache_path)?;
        tracing::info!(
            "Loaded {} cached pages from {}",
            entries.len(),
            settings.cache_path.display()
        );

        let state = SharedState {
            entries,
            ..SharedState::default()
        };

        Ok(Self {
            inner: Arc::new(CrawlContext {
                settings,
                fetcher,
                resolver,
                cache,
                state: Mutex::new(state),
            }),
            batch_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Opens a crawler with HTTP collaborators built from the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = HttpPageFetcher::new(config)?;
        let resolver = RobotsResolver::from_config(config)?;
        Self::open(CrawlSettings::from_config(config), Arc::new(fetcher), resolver)
    }

    pub fn settings(&self) -> &CrawlSettings {
        &self.inner.settings
    }

    /// Crawls a batch of URLs and returns once every one has an entry
    ///
    /// URLs are enqueued as given, duplicates included; cached and repeated
    /// URLs are skipped by the workers. Failures to fetch a page are recorded
    /// as empty entries and never abort the batch.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Every URL has been processed
    /// * `Err(CrawlerError::Worker)` - A worker task died; the batch is
    ///   still complete, since workers only stop after the queue drained
    pub async fn crawl_pages<I, S>(&self, urls: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let _batch = self.batch_lock.lock().await;

        let queue = Arc::new(WorkQueue::new());
        let mut submitted = 0usize;
        for url in urls {
            queue.put(WorkItem::Crawl(url.into()));
            submitted += 1;
        }

        let num_workers = self.inner.settings.num_threads.max(1);
        tracing::info!("Crawling {} URLs with {} workers", submitted, num_workers);
        let start_time = std::time::Instant::now();

        let workers: Vec<_> = (0..num_workers)
            .map(|id| {
                let context = Arc::clone(&self.inner);
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { context.run_worker(id, queue).await })
            })
            .collect();

        queue.join().await;

        for _ in 0..num_workers {
            queue.put(WorkItem::Stop);
        }

        let mut failure = None;
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!("Crawl worker terminated abnormally: {}", e);
                failure.get_or_insert(e);
            }
        }

        tracing::info!(
            "Batch of {} URLs finished in {:?}",
            submitted,
            start_time.elapsed()
        );

        match failure {
            Some(e) => Err(CrawlerError::Worker(e)),
            None => Ok(()),
        }
    }

    /// Extracted text of `url`, if it was crawled and had any
    pub fn content_of(&self, url: &str) -> Option<String> {
        self.inner
            .lock_state()
            .entries
            .get(url)
            .and_then(|entry| entry.content.clone())
    }

    /// Publish date of `url`, if it was crawled and one was found
    pub fn publish_date_of(&self, url: &str) -> Option<String> {
        self.inner
            .lock_state()
            .entries
            .get(url)
            .and_then(|entry| entry.date.clone())
    }

    pub fn entry(&self, url: &str) -> Option<CacheEntry> {
        self.inner.lock_state().entries.get(url).cloned()
    }

    /// Snapshot of every known entry
    pub fn entries(&self) -> HashMap<String, CacheEntry> {
        self.inner.lock_state().entries.clone()
    }

    /// Returns true if `url` has an entry, i.e. will not be fetched again
    pub fn contains(&self, url: &str) -> bool {
        self.inner.lock_state().entries.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.inner.lock_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The resolved policy of `domain`, if it has been resolved
    pub fn policy_of(&self, domain: &str) -> Option<DomainPolicy> {
        self.inner
            .lock_state()
            .policies
            .get(domain)
            .and_then(|cell| cell.get().cloned())
    }

    /// Politeness bookkeeping of `domain`, if it is fetchable and was seen
    pub fn visit_state_of(&self, domain: &str) -> Option<DomainVisitState> {
        self.inner.lock_state().visits.get(domain).cloned()
    }
}

impl CrawlContext {
    fn lock_state(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_worker(self: Arc<Self>, id: usize, queue: Arc<WorkQueue>) {
        tracing::debug!("Worker {} started", id);

        while let Some(item) = queue.get().await {
            let url = match item {
                WorkItem::Crawl(url) => url,
                WorkItem::Stop => break,
            };

            // Own task per URL, so a panic surfaces here as a JoinError
            let task = {
                let context = Arc::clone(&self);
                let url = url.clone();
                tokio::spawn(async move { context.process(&url).await })
            };

            self.settle(id, &url, task.await);
            queue.task_done();
        }

        tracing::debug!("Worker {} stopped", id);
    }

    /// Makes sure a processed URL ends up with an entry and out of flight
    fn settle(
        &self,
        id: usize,
        url: &str,
        outcome: std::result::Result<Result<()>, JoinError>,
    ) {
        match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => tracing::error!("Worker {} failed on {}: {}", id, url, e),
            Err(e) => tracing::error!("Worker {} crashed on {}: {}", id, url, e),
        }
        self.record_failure(url);
    }

    async fn process(&self, url: &str) -> Result<()> {
        let mut tracker = PhaseTracker::new(url);
        let agent = self.settings.robots_agent.as_str();

        {
            let mut state = self.lock_state();
            if state.entries.contains_key(url) {
                tracing::trace!("{} is cached, skipping", url);
                return Ok(());
            }
            if !state.in_flight.insert(url.to_string()) {
                tracing::trace!("{} is already being crawled, skipping", url);
                return Ok(());
            }
        }

        tracker.advance(CrawlPhase::ResolvingPolicy);
        let domain = match parse_request(url) {
            Ok((_, domain)) => domain,
            Err(e) => {
                tracing::warn!("Cannot crawl {}: {}", url, e);
                tracker.advance(CrawlPhase::Done);
                return self.commit(CacheEntry::empty(url));
            }
        };

        let policy = self.policy_for(&domain).await;
        if let Some(rules) = policy.rules() {
            let delay = rules.crawl_delay(agent, self.settings.default_crawl_delay);
            self.lock_state()
                .visits
                .entry(domain.clone())
                .or_insert_with(|| DomainVisitState::new(delay));
        }

        if !policy.can_fetch(url, agent) {
            tracing::warn!("Not allowed to crawl {}", url);
            tracker.advance(CrawlPhase::Done);
            return self.commit(CacheEntry::empty(url));
        }

        tracker.advance(CrawlPhase::RateLimitedWait);
        let start = {
            let mut state = self.lock_state();
            let default_delay = self.settings.default_crawl_delay;
            let visit = state
                .visits
                .entry(domain.clone())
                .or_insert_with(|| DomainVisitState::new(default_delay));
            let start = visit.reserve_slot(Instant::now());
            start
        };
        tokio::time::sleep_until(start).await;

        tracker.advance(CrawlPhase::Fetching);
        let page = self.fetcher.fetch(url).await;
        tracing::debug!(
            "Fetched {}: content={}, date={}",
            url,
            page.content.is_some(),
            page.publish_date.is_some()
        );

        tracker.advance(CrawlPhase::Done);
        let mut state = self.lock_state();
        if let Some(visit) = state.visits.get_mut(&domain) {
            visit.record_visit(Instant::now());
        }
        self.store(
            &mut state,
            CacheEntry::new(url, page.content, page.publish_date),
        )
    }

    /// Returns the domain's policy, resolving it if no worker has yet
    async fn policy_for(&self, domain: &str) -> DomainPolicy {
        let cell = {
            let mut state = self.lock_state();
            let cell = Arc::clone(state.policies.entry(domain.to_string()).or_default());
            cell
        };

        let policy = cell
            .get_or_init(|| async {
                tracing::debug!("Resolving robots policy for {}", domain);
                self.resolver.resolve(domain).await
            })
            .await;

        policy.clone()
    }

    fn commit(&self, entry: CacheEntry) -> Result<()> {
        let mut state = self.lock_state();
        self.store(&mut state, entry)
    }

    /// Stores an entry in memory and appends it to the lookup file
    ///
    /// The in-memory entry is kept even if the append fails, so the URL is
    /// not retried within this process.
    fn store(&self, state: &mut SharedState, entry: CacheEntry) -> Result<()> {
        state.in_flight.remove(&entry.url);
        let appended = self.cache.append(&entry);
        state.entries.insert(entry.url.clone(), entry);
        appended.map_err(CrawlerError::from)
    }

    /// Records a URL whose processing failed as an empty entry
    ///
    /// A URL that already has an entry keeps it.
    fn record_failure(&self, url: &str) {
        let mut state = self.lock_state();
        if state.entries.contains_key(url) {
            state.in_flight.remove(url);
            return;
        }
        if let Err(e) = self.store(&mut state, CacheEntry::empty(url)) {
            tracing::error!("Failed to record failed URL {}: {}", url, e);
        }
    }
}
