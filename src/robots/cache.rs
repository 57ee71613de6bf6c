//! Robots.txt caching implementation
//!
//! Policies are cached per origin, with expiration after 24 hours.

use crate::robots::RobotsPolicy;
use crate::url::origin_key;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use url::Url;

/// Cached robots.txt policy for one origin
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// The parsed policy
    pub policy: RobotsPolicy,

    /// When the robots.txt was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    /// Wraps a policy with the current timestamp
    pub fn new(policy: RobotsPolicy) -> Self {
        Self {
            policy,
            fetched_at: Utc::now(),
        }
    }

    /// Checks if the cached robots.txt is stale (older than 24 hours)
    pub fn is_stale(&self) -> bool {
        self.age() > Duration::hours(24)
    }

    /// Returns how long ago the robots.txt was fetched
    pub fn age(&self) -> Duration {
        Utc::now() - self.fetched_at
    }
}

/// Per-origin robots.txt cache
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: HashMap<String, CachedRobots>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the fresh cached policy for the URL's origin, if any
    pub fn get(&self, url: &Url) -> Option<&CachedRobots> {
        self.entries
            .get(&origin_key(url))
            .filter(|cached| !cached.is_stale())
    }

    /// Stores the policy for the URL's origin, replacing any previous entry
    pub fn insert(&mut self, url: &Url, policy: RobotsPolicy) -> &CachedRobots {
        let key = origin_key(url);
        self.entries.insert(key.clone(), CachedRobots::new(policy));
        &self.entries[&key]
    }

    /// Checks a URL against its origin's cached policy
    ///
    /// # Returns
    ///
    /// * `Some(bool)` - Decision from a fresh cached policy
    /// * `None` - Origin not cached (or stale); the caller must fetch robots.txt
    pub fn is_allowed(&self, url: &Url, user_agent: &str) -> Option<bool> {
        self.get(url)
            .map(|cached| cached.policy.is_url_allowed(url, user_agent))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
