use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Checks if a host belongs to the seed host
///
/// With `include_subdomains` set, any subdomain of the seed host (at any
/// nesting level) also matches. The bare seed host always matches.
///
/// # Examples
///
/// ```
/// use reconmap::url::matches_host;
///
/// assert!(matches_host("example.com", "example.com", false));
/// assert!(!matches_host("example.com", "api.example.com", false));
/// assert!(matches_host("example.com", "api.v2.example.com", true));
/// assert!(!matches_host("example.com", "notexample.com", true));
/// ```
pub fn matches_host(seed_host: &str, candidate: &str, include_subdomains: bool) -> bool {
    if candidate == seed_host {
        return true;
    }

    include_subdomains
        && candidate.len() > seed_host.len()
        && candidate.ends_with(seed_host)
        && candidate.as_bytes()[candidate.len() - seed_host.len() - 1] == b'.'
}

/// A compiled glob pattern
///
/// `*` matches any run of characters (including `/`), `?` matches a single
/// character, everything else is literal. Patterns are anchored at both ends.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        if pattern.trim().is_empty() {
            return Err(ConfigError::InvalidPattern(
                "exclude pattern cannot be empty".to_string(),
            ));
        }

        let mut expr = String::with_capacity(pattern.len() + 8);
        expr.push('^');
        for c in pattern.chars() {
            match c {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }
        expr.push('$');

        let regex = Regex::new(&expr)
            .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }
}

/// Ordered set of exclude globs
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet {
    patterns: Vec<GlobPattern>,
}

impl ExcludeSet {
    /// Compiles every pattern, failing on the first invalid one
    pub fn compile(patterns: &[String]) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|p| GlobPattern::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns the first pattern matching the URL's path or the full URL
    pub fn matching_pattern(&self, url: &Url) -> Option<&str> {
        let path = url.path();
        let full = url.as_str();
        self.patterns
            .iter()
            .find(|p| p.matches(path) || p.matches(full))
            .map(GlobPattern::as_str)
    }

    pub fn is_excluded(&self, url: &Url) -> bool {
        self.matching_pattern(url).is_some()
    }
}
