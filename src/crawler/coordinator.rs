//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that ties every other part together:
//! - Admitting frontier entries (depth, scope, robots.txt, pattern budget)
//! - Dispatching up to `max-concurrent-pages` workers at once
//! - Recording results and enqueueing discovered links
//! - Enforcing the page budget and the global deadline
//! - Switching to rendered fetching when the seed turns out to be an SPA

use crate::browser::BrowserSession;
use crate::config::{validate, CrawlConfig, RenderMode};
use crate::crawler::fetcher::{Fetcher, Transport};
use crate::crawler::frontier::{Frontier, FrontierEntry};
use crate::crawler::pacer::RequestPacer;
use crate::crawler::worker::{PageFetch, PageWorker};
use crate::output::{
    CrawlResult, CrawlStatistics, GraphBuilder, PageResult, SiteMap, SkipCounters,
};
use crate::pattern::PatternNormalizer;
use crate::robots::{fetch_robots, RobotsCache};
use crate::state::CrawlState;
use crate::url::{normalize, normalize_url, Scope};
use crate::{ReconError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use url::Url;

type InFlight = JoinSet<(FrontierEntry, PageFetch)>;

/// Outcome of the pre-fetch checks for one frontier entry
enum Admission {
    Dispatch,
    Skip,
    /// The deadline passed while checking
    OutOfTime,
}

/// Main crawler coordinator structure
///
/// Owns all mutable crawl state. Workers only ever see a URL and hand back a
/// [`PageFetch`]; the visited set, the pattern budget and the site map are
/// touched from the coordinator task alone.
pub struct Coordinator {
    config: Arc<CrawlConfig>,
    seed: Url,
    scope: Scope,
    state: CrawlState,
    fetcher: Fetcher,
    worker: PageWorker,
    frontier: Frontier,
    robots: RobotsCache,
    normalizer: Option<PatternNormalizer>,
    sitemap: SiteMap,
    skipped: SkipCounters,
    dispatched: usize,
    /// Depth of the pages currently in flight
    level: u32,
    deadline: Option<Instant>,
    rendered: bool,
    spa_detected: bool,
    deadline_reached: bool,
    started_at: DateTime<Utc>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawl configuration, validated again here
    /// * `transport` - HTTP transport used for static fetches and robots.txt
    /// * `browser` - Browser session for rendered fetching, if any
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to [`run`](Self::run)
    /// * `Err(ReconError)` - Invalid configuration, or rendered mode without a browser
    pub fn new(
        config: CrawlConfig,
        transport: Arc<dyn Transport>,
        browser: Option<Arc<dyn BrowserSession>>,
    ) -> Result<Self> {
        validate(&config)?;

        let seed = normalize_url(&config.target_url)?;
        let scope = Scope::new(&seed, &config.scope)?;

        if config.render.mode == RenderMode::Rendered && browser.is_none() {
            return Err(ReconError::Browser(
                "rendered mode requires a browser session".to_string(),
            ));
        }

        let pacer = Arc::new(RequestPacer::new(config.crawler.request_delay()));
        let fetcher = Fetcher::new(transport, pacer, &config.crawler);
        let worker = PageWorker::new(fetcher.clone(), browser, &config);
        let normalizer = config
            .patterns
            .enabled
            .then(|| PatternNormalizer::new(config.patterns.max_samples_per_pattern));
        let rendered = config.render.mode == RenderMode::Rendered;

        Ok(Self {
            config: Arc::new(config),
            seed,
            scope,
            state: CrawlState::Idle,
            fetcher,
            worker,
            frontier: Frontier::new(),
            robots: RobotsCache::new(),
            normalizer,
            sitemap: SiteMap::new(),
            skipped: SkipCounters::default(),
            dispatched: 0,
            level: 0,
            deadline: None,
            rendered,
            spa_detected: false,
            deadline_reached: false,
            started_at: Utc::now(),
        })
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    /// Runs the crawl to completion
    ///
    /// The crawl ends when the frontier is drained, the page budget is spent
    /// or the deadline passes. Pages still in flight at the deadline are
    /// abandoned and do not appear in the result.
    ///
    /// Pages are dispatched one depth level at a time: nothing at depth d+1
    /// starts until every page at depth d has been recorded, so each URL is
    /// first queued at its shortest distance from the seed.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlResult)` - Crawl completed, possibly with errored pages
    /// * `Err(ReconError::SeedUnreachable)` - The seed produced no response at all
    pub async fn run(mut self) -> Result<CrawlResult> {
        self.transition(CrawlState::Running)?;
        self.started_at = Utc::now();
        tracing::info!(
            "Starting crawl of {} (max depth {}, {} concurrent, {})",
            self.seed,
            self.config.crawler.max_depth,
            self.config.crawler.max_concurrent_pages,
            if self.rendered { "rendered" } else { "static" }
        );

        let start_time = std::time::Instant::now();
        self.deadline = self
            .config
            .crawler
            .max_duration()
            .map(|limit| Instant::now() + limit);
        let deadline = self.deadline;
        let max_concurrent = self.config.crawler.max_concurrent_pages.max(1) as usize;

        self.frontier.push(self.seed.clone(), 0, None);
        let mut in_flight = InFlight::new();

        'crawl: loop {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                self.abandon(&mut in_flight);
                break;
            }

            while in_flight.len() < max_concurrent && !self.page_budget_spent() {
                let Some(next_depth) = self.frontier.peek_depth() else {
                    break;
                };
                if !in_flight.is_empty() && next_depth > self.level {
                    // Wait for the current level to finish
                    break;
                }
                let Some(entry) = self.frontier.pop() else {
                    break;
                };
                match self.admit(&entry).await {
                    Admission::Dispatch => {}
                    Admission::Skip => continue,
                    Admission::OutOfTime => {
                        self.abandon(&mut in_flight);
                        break 'crawl;
                    }
                }

                self.level = entry.depth;
                self.dispatched += 1;
                tracing::debug!("Dispatching {} (depth {})", entry.url, entry.depth);

                let worker = self.worker.clone();
                let rendered = self.rendered;
                in_flight.spawn(async move {
                    let fetch = worker.process(&entry.url, rendered).await;
                    (entry, fetch)
                });
            }

            if in_flight.is_empty() {
                tracing::info!("Frontier is empty, crawl complete");
                break;
            }

            let joined = match deadline {
                Some(deadline) => tokio::select! {
                    joined = in_flight.join_next() => joined,
                    _ = tokio::time::sleep_until(deadline) => {
                        self.abandon(&mut in_flight);
                        break;
                    }
                },
                None => in_flight.join_next().await,
            };

            match joined {
                Some(Ok((entry, fetch))) => {
                    if let Err(e) = self.record(entry, fetch) {
                        in_flight.abort_all();
                        self.transition(CrawlState::Aborted)?;
                        tracing::error!("Aborting crawl: {}", e);
                        return Err(e);
                    }
                }
                Some(Err(e)) => tracing::error!("Page task failed: {}", e),
                None => break,
            }

            let crawled = self.sitemap.len();
            if crawled > 0 && crawled % 10 == 0 {
                tracing::info!(
                    "Progress: {} pages crawled, {} in frontier, {} in flight",
                    crawled,
                    self.frontier.len(),
                    in_flight.len()
                );
            }
        }

        self.transition(CrawlState::Completed)?;
        tracing::info!(
            "Crawl completed: {} pages crawled in {:?}",
            self.sitemap.len(),
            start_time.elapsed()
        );

        Ok(self.finish(start_time.elapsed().as_millis() as u64))
    }

    fn transition(&mut self, to: CrawlState) -> Result<()> {
        self.state = self.state.transition(to)?;
        tracing::debug!("Crawl state: {}", self.state);
        Ok(())
    }

    fn page_budget_spent(&self) -> bool {
        self.config
            .crawler
            .max_pages
            .is_some_and(|max| self.dispatched >= max)
    }

    fn abandon(&mut self, in_flight: &mut InFlight) {
        tracing::warn!(
            "Crawl deadline reached, abandoning {} in-flight page(s)",
            in_flight.len()
        );
        in_flight.abort_all();
        self.deadline_reached = true;
    }

    /// Decides whether a dequeued entry is fetched, counting the reason if not
    ///
    /// Checks run cheapest first. A URL that passes holds a pattern slot until
    /// its result is recorded.
    async fn admit(&mut self, entry: &FrontierEntry) -> Admission {
        let url = &entry.url;

        if entry.depth > self.config.crawler.max_depth {
            tracing::debug!("Skipping {}: depth {}", url, entry.depth);
            self.skipped.depth += 1;
            return Admission::Skip;
        }

        if !self.scope.contains(url) {
            tracing::debug!("Skipping {}: out of scope", url);
            self.skipped.scope += 1;
            return Admission::Skip;
        }

        if self.config.scope.respect_robots {
            match self.robots_allow(url).await {
                Some(true) => {}
                Some(false) => {
                    tracing::info!("URL {} disallowed by robots.txt", url);
                    self.skipped.robots += 1;
                    return Admission::Skip;
                }
                None => return Admission::OutOfTime,
            }
        }

        if let Some(normalizer) = self.normalizer.as_mut() {
            if normalizer.should_skip(url) {
                tracing::debug!("Skipping {}: pattern sample budget spent", url);
                normalizer.add(url);
                self.skipped.pattern += 1;
                return Admission::Skip;
            }
            normalizer.reserve(url);
        }

        Admission::Dispatch
    }

    /// Robots verdict for `url`, or `None` if the deadline passed while
    /// robots.txt was being fetched
    async fn robots_allow(&mut self, url: &Url) -> Option<bool> {
        let user_agent = self.config.crawler.user_agent.as_str();
        if let Some(allowed) = self.robots.is_allowed(url, user_agent) {
            return Some(allowed);
        }

        let fetch = fetch_robots(&self.fetcher, url);
        let policy = match self.deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, fetch).await {
                Ok(policy) => policy,
                Err(_) => {
                    tracing::warn!("Deadline passed while fetching robots.txt for {}", url);
                    return None;
                }
            },
            None => fetch.await,
        };
        if let Some(delay) = policy.crawl_delay(user_agent) {
            tracing::info!("Honouring robots.txt crawl delay of {:?}", delay);
            self.fetcher.pacer().raise_interval(delay).await;
        }

        let allowed = self
            .robots
            .insert(url, policy)
            .policy
            .is_url_allowed(url, user_agent);
        Some(allowed)
    }

    /// Stores the result for one page and enqueues its links
    fn record(&mut self, entry: FrontierEntry, fetch: PageFetch) -> Result<()> {
        let FrontierEntry { url, depth, parent } = entry;

        if parent.is_none() && fetch.is_unreachable() {
            return Err(ReconError::SeedUnreachable {
                url: url.to_string(),
                reason: fetch.error.unwrap_or_default(),
            });
        }

        if let Some(normalizer) = self.normalizer.as_mut() {
            normalizer.add(&url);
        }

        if depth == 0 {
            self.note_seed(&fetch);
        }

        let followable = fetch.is_followable();
        let parent_url = parent.map(String::from);
        let mut page = PageResult::new(url.as_str(), fetch.status, depth, parent_url);

        let mut seen = HashSet::new();
        page.links = fetch
            .links
            .into_iter()
            .filter(|link| seen.insert(link.clone()))
            .collect();
        page.title = fetch.title;
        page.forms = fetch.forms;
        page.buttons = fetch.buttons;
        page.api_endpoints = fetch.endpoints;
        page.error = fetch.error;

        if !fetch.redirect_chain.is_empty() {
            page.redirect_chain = fetch
                .redirect_chain
                .into_iter()
                .chain(fetch.final_url)
                .filter_map(|hop| normalize(hop).ok())
                .map(String::from)
                .collect();
            // `/dir` -> `/dir/` is one URL once normalized
            page.redirect_chain.dedup();
            if page.redirect_chain.len() < 2 {
                page.redirect_chain.clear();
            }
        }

        if followable {
            let mut queued = 0;
            for link in &page.links {
                match Url::parse(link) {
                    Ok(next) => {
                        if self.frontier.push(next, depth + 1, Some(url.clone())) {
                            queued += 1;
                        }
                    }
                    Err(e) => tracing::debug!("Dropping link {}: {}", link, e),
                }
            }
            tracing::debug!("{}: {} links, {} new", url, page.links.len(), queued);
        }

        if let Some(error) = &page.error {
            tracing::warn!("Failed to crawl {}: {}", url, error);
        }

        self.sitemap.add(page);
        Ok(())
    }

    fn note_seed(&mut self, fetch: &PageFetch) {
        self.spa_detected = fetch.spa_detected;

        if self.config.render.mode != RenderMode::Auto || !fetch.spa_detected || self.rendered {
            return;
        }

        if self.worker.has_browser() {
            tracing::info!(
                "Seed looks like a single-page application, switching to rendered fetching"
            );
            self.rendered = true;
        } else {
            tracing::warn!(
                "Seed looks like a single-page application but no browser is available"
            );
        }
    }

    fn finish(self, duration_ms: u64) -> CrawlResult {
        let total_errors = self.sitemap.pages().iter().filter(|p| p.is_error()).count();
        let statistics = CrawlStatistics {
            sitemap: self.sitemap.statistics(),
            total_errors,
            skipped: self.skipped,
            spa_detected: self.spa_detected,
            deadline_reached: self.deadline_reached,
            duration_ms,
        };
        let patterns = self.normalizer.as_ref().map(PatternNormalizer::results);
        let pages = self.sitemap.into_pages();
        let graph = self
            .config
            .output
            .knowledge_graph
            .then(|| GraphBuilder::build(&pages));

        CrawlResult {
            target: self.seed.to_string(),
            config_hash: None,
            state: self.state,
            started_at: self.started_at,
            finished_at: Utc::now(),
            pages,
            statistics,
            patterns,
            graph,
        }
    }
}
