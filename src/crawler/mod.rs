//! Crawler module for page fetching and crawl orchestration
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with redirects, retries and shared pacing
//! - The breadth-first frontier
//! - Per-page workers for static and rendered fetching
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod frontier;
mod pacer;
mod worker;

pub use coordinator::Coordinator;
pub use fetcher::{
    FetchResponse, FetchResult, Fetcher, HttpTransport, Transport, MAX_REDIRECTS,
};
pub use frontier::{Frontier, FrontierEntry};
pub use pacer::RequestPacer;
pub use worker::{PageFetch, PageWorker};

use crate::browser::BrowserSession;
use crate::config::{validate, CrawlConfig};
use crate::output::CrawlResult;
use crate::Result;
use std::sync::Arc;

/// Runs a complete static crawl over HTTP
///
/// This is the main entry point for crawling without a browser. It will:
/// 1. Validate the configuration
/// 2. Build the HTTP transport
/// 3. Fetch robots.txt and the seed
/// 4. Follow links breadth-first within the configured budgets
/// 5. Return the assembled [`CrawlResult`]
///
/// # Arguments
///
/// * `config` - The crawl configuration
///
/// # Returns
///
/// * `Ok(CrawlResult)` - Crawl completed
/// * `Err(ReconError)` - Invalid configuration or unreachable seed
pub async fn crawl(config: CrawlConfig) -> Result<CrawlResult> {
    validate(&config)?;
    let transport = Arc::new(HttpTransport::from_config(&config.crawler)?);
    crawl_with(config, transport, None).await
}

/// Runs a crawl over the given transport and optional browser session
pub async fn crawl_with(
    config: CrawlConfig,
    transport: Arc<dyn Transport>,
    browser: Option<Arc<dyn BrowserSession>>,
) -> Result<CrawlResult> {
    Coordinator::new(config, transport, browser)?.run().await
}
