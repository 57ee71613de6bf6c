//! URL handling module
//!
//! This module provides href resolution, canonical normalization, and the
//! scope policy deciding which URLs the crawl may visit. Raw or relative URL
//! forms never leave this module: everything the crawler stores has passed
//! through [`normalize`].

mod domain;
mod matcher;
mod normalize;
mod resolve;

use crate::config::ScopeConfig;
use crate::ConfigError;
use url::Url;

// Re-export main functions
pub use domain::{extract_domain, origin_key};
pub use matcher::{matches_host, ExcludeSet, GlobPattern};
pub use normalize::{normalize, normalize_url};
pub use resolve::resolve_url;

/// Compiled scope policy for one crawl
///
/// A URL is in scope iff its host is the seed host (or a subdomain of it when
/// subdomains are included) and no exclude pattern matches its path or full
/// URL. Exclusion wins over a host match.
#[derive(Debug, Clone)]
pub struct Scope {
    seed_host: String,
    include_subdomains: bool,
    excludes: ExcludeSet,
}

impl Scope {
    /// Builds the scope policy for a seed URL
    ///
    /// # Arguments
    ///
    /// * `seed` - The normalized seed URL
    /// * `config` - Scope settings
    ///
    /// # Returns
    ///
    /// * `Ok(Scope)` - Compiled scope
    /// * `Err(ConfigError)` - Seed has no host or an exclude pattern is invalid
    pub fn new(seed: &Url, config: &ScopeConfig) -> Result<Self, ConfigError> {
        let seed_host = extract_domain(seed)
            .ok_or_else(|| ConfigError::InvalidUrl(format!("Seed URL {} has no host", seed)))?;

        Ok(Self {
            seed_host,
            include_subdomains: config.include_subdomains,
            excludes: ExcludeSet::compile(&config.exclude_patterns)?,
        })
    }

    pub fn seed_host(&self) -> &str {
        &self.seed_host
    }

    /// Returns true if the crawl may visit this URL
    pub fn contains(&self, url: &Url) -> bool {
        let Some(host) = extract_domain(url) else {
            return false;
        };

        if !matches_host(&self.seed_host, &host, self.include_subdomains) {
            return false;
        }

        !self.excludes.is_excluded(url)
    }
}

/// One-shot scope check
///
/// Compiles the scope for every call; the crawler itself holds a [`Scope`].
/// An invalid exclude pattern makes everything out of scope.
///
/// # Examples
///
/// ```
/// use reconmap::config::ScopeConfig;
/// use reconmap::url::in_scope;
/// use url::Url;
///
/// let seed = Url::parse("https://example.com/").unwrap();
/// let config = ScopeConfig { exclude_patterns: vec!["*.pdf".into()], ..Default::default() };
///
/// assert!(in_scope(&Url::parse("https://example.com/about").unwrap(), &seed, &config));
/// assert!(!in_scope(&Url::parse("https://example.com/a.pdf").unwrap(), &seed, &config));
/// assert!(!in_scope(&Url::parse("https://api.example.com/").unwrap(), &seed, &config));
/// ```
pub fn in_scope(url: &Url, seed: &Url, config: &ScopeConfig) -> bool {
    match Scope::new(seed, config) {
        Ok(scope) => scope.contains(url),
        Err(e) => {
            tracing::warn!("Invalid scope configuration: {}", e);
            false
        }
    }
}
