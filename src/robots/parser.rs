//! Robots.txt parser implementation
//!
//! Allow/deny decisions come from the robotstxt crate's matcher. The content
//! is also scanned here for user-agent groups and `Crawl-delay`, which the
//! matcher does not expose.

use robotstxt::DefaultMatcher;
use std::time::Duration;
use url::Url;

/// Directives shared by one or more consecutive User-agent lines
#[derive(Debug, Clone, Default)]
pub struct RobotsGroup {
    /// Lowercased agent tokens
    pub agents: Vec<String>,
    /// Number of non-empty Allow/Disallow lines
    pub rule_count: usize,
    /// Crawl-delay in seconds
    pub crawl_delay: Option<f64>,
}

impl RobotsGroup {
    fn is_wildcard(&self) -> bool {
        self.agents.iter().any(|a| a == "*")
    }

    fn names_agent(&self, user_agent: &str) -> bool {
        self.agents
            .iter()
            .any(|a| a != "*" && !a.is_empty() && user_agent.contains(a.as_str()))
    }
}

/// Parsed robots.txt policy
#[derive(Debug, Clone, Default)]
pub struct RobotsPolicy {
    /// Raw robots.txt content (empty means allow all)
    content: String,
    groups: Vec<RobotsGroup>,
}

impl RobotsPolicy {
    /// Parses raw robots.txt content
    ///
    /// Comments are stripped and directive names are case-insensitive.
    /// Consecutive User-agent lines share one group; a User-agent line that
    /// follows rules starts a new group. Lines before the first User-agent and
    /// unknown directives are ignored.
    ///
    /// # Arguments
    ///
    /// * `content` - The raw robots.txt file content
    pub fn parse(content: &str) -> Self {
        let mut groups = Vec::new();
        let mut current: Option<RobotsGroup> = None;
        let mut in_rules = false;

        for line in content.lines() {
            let line = match line.find('#') {
                Some(idx) => &line[..idx],
                None => line,
            }
            .trim();

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    if in_rules {
                        groups.extend(current.take());
                        in_rules = false;
                    }
                    current
                        .get_or_insert_with(RobotsGroup::default)
                        .agents
                        .push(value.to_lowercase());
                }
                "allow" | "disallow" => {
                    let Some(group) = current.as_mut() else {
                        continue;
                    };
                    in_rules = true;
                    if !value.is_empty() {
                        group.rule_count += 1;
                    }
                }
                "crawl-delay" => {
                    let Some(group) = current.as_mut() else {
                        continue;
                    };
                    in_rules = true;
                    match value.parse::<f64>() {
                        Ok(delay) if delay.is_finite() && delay >= 0.0 => {
                            group.crawl_delay = Some(delay)
                        }
                        _ => tracing::debug!("Ignoring invalid crawl-delay '{}'", value),
                    }
                }
                _ => {}
            }
        }

        groups.extend(current);
        Self {
            content: content.to_string(),
            groups,
        }
    }

    /// Creates a permissive policy that allows everything
    ///
    /// Used when robots.txt is missing or could not be fetched.
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> &[RobotsGroup] {
        &self.groups
    }

    /// Groups whose crawl delay applies to a user agent
    ///
    /// Groups naming a token contained in our user agent take precedence; the
    /// `*` groups apply only when none does.
    fn groups_for(&self, user_agent: &str) -> Vec<&RobotsGroup> {
        let user_agent = user_agent.to_lowercase();

        let specific: Vec<&RobotsGroup> = self
            .groups
            .iter()
            .filter(|g| g.names_agent(&user_agent))
            .collect();

        if !specific.is_empty() {
            return specific;
        }

        self.groups.iter().filter(|g| g.is_wildcard()).collect()
    }

    /// Checks if a path (with optional query) is allowed for the given user agent
    ///
    /// The longest matching pattern wins and Allow wins a tie. No matching
    /// rule means allowed.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to check, e.g. "/admin/page?x=1", or a full URL
    /// * `user_agent` - The user agent string
    pub fn is_allowed(&self, path: &str, user_agent: &str) -> bool {
        if self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, path)
    }

    /// Checks a full URL against the policy using its path and query
    pub fn is_url_allowed(&self, url: &Url, user_agent: &str) -> bool {
        self.is_allowed(url.as_str(), user_agent)
    }

    /// Gets the crawl delay for a specific user agent
    ///
    /// # Returns
    ///
    /// * `Some(Duration)` - The delay from the first applicable group that sets one
    /// * `None` - If no crawl delay is specified
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        self.groups_for(user_agent)
            .into_iter()
            .find_map(|g| g.crawl_delay)
            .map(Duration::from_secs_f64)
    }
}
