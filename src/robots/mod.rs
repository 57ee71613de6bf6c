//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::{RobotsGroup, RobotsPolicy};

use crate::crawler::{FetchResult, Fetcher};
use url::Url;

/// Returns the robots.txt location for the origin of `url`
pub fn robots_url(url: &Url) -> Option<Url> {
    let mut robots = url.clone();
    robots.set_path("/robots.txt");
    robots.set_query(None);
    robots.set_fragment(None);
    if robots.host_str().is_some() {
        Some(robots)
    } else {
        None
    }
}

/// Fetches and parses robots.txt for the origin of `url`
///
/// Any failure (missing file, client error, server error after retries,
/// network failure) yields an allow-all policy: the crawl proceeds as if the
/// target published no restrictions.
///
/// # Arguments
///
/// * `fetcher` - The shared fetcher (requests are paced like any other)
/// * `url` - Any URL on the origin of interest
pub async fn fetch_robots(fetcher: &Fetcher, url: &Url) -> RobotsPolicy {
    let Some(location) = robots_url(url) else {
        return RobotsPolicy::allow_all();
    };

    match fetcher.fetch(&location).await {
        FetchResult::Success(response) => {
            let policy = RobotsPolicy::parse(&response.body);
            tracing::info!(
                "Loaded robots.txt from {} ({} groups)",
                location,
                policy.groups().len()
            );
            policy
        }
        FetchResult::HttpError { status, .. } => {
            tracing::debug!("robots.txt at {} returned {}, allowing all", location, status);
            RobotsPolicy::allow_all()
        }
        FetchResult::NetworkError { error, .. } => {
            tracing::warn!(
                "Failed to fetch robots.txt from {}: {}, allowing all",
                location,
                error
            );
            RobotsPolicy::allow_all()
        }
    }
}
