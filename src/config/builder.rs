use crate::browser::{Viewport, WaitStrategy};
use crate::config::types::{CrawlConfig, RenderMode};
use crate::config::validation::validate;
use crate::ConfigResult;
use std::time::Duration;

/// Programmatic, validated construction of a [`CrawlConfig`]
///
/// Starts from the same defaults as a minimal TOML file.
///
/// ```
/// use reconmap::config::CrawlConfig;
///
/// let config = CrawlConfig::builder("https://example.com/")
///     .max_depth(2)
///     .exclude_pattern("*.pdf")
///     .build()
///     .unwrap();
/// assert_eq!(config.crawler.max_depth, 2);
/// ```
#[derive(Debug, Clone)]
pub struct CrawlConfigBuilder {
    config: CrawlConfig,
}

impl CrawlConfig {
    pub fn builder(target_url: impl Into<String>) -> CrawlConfigBuilder {
        CrawlConfigBuilder::new(target_url)
    }
}

impl CrawlConfigBuilder {
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            config: CrawlConfig {
                target_url: target_url.into(),
                crawler: Default::default(),
                scope: Default::default(),
                patterns: Default::default(),
                render: Default::default(),
                output: Default::default(),
            },
        }
    }

    pub fn max_depth(mut self, depth: u32) -> Self {
        self.config.crawler.max_depth = depth;
        self
    }

    pub fn max_pages(mut self, pages: usize) -> Self {
        self.config.crawler.max_pages = Some(pages);
        self
    }

    pub fn max_duration(mut self, duration: Duration) -> Self {
        self.config.crawler.max_duration_secs = Some(duration.as_secs());
        self
    }

    pub fn max_concurrent_pages(mut self, pages: u32) -> Self {
        self.config.crawler.max_concurrent_pages = pages;
        self
    }

    pub fn request_delay(mut self, delay: Duration) -> Self {
        self.config.crawler.request_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.crawler.timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.crawler.max_retries = retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.crawler.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.crawler.user_agent = user_agent.into();
        self
    }

    pub fn respect_robots(mut self, respect: bool) -> Self {
        self.config.scope.respect_robots = respect;
        self
    }

    pub fn include_subdomains(mut self, include: bool) -> Self {
        self.config.scope.include_subdomains = include;
        self
    }

    /// Appends an exclude glob; order is preserved
    pub fn exclude_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.scope.exclude_patterns.push(pattern.into());
        self
    }

    pub fn pattern_normalization(mut self, enabled: bool) -> Self {
        self.config.patterns.enabled = enabled;
        self
    }

    pub fn max_samples_per_pattern(mut self, samples: usize) -> Self {
        self.config.patterns.max_samples_per_pattern = samples;
        self
    }

    pub fn render_mode(mut self, mode: RenderMode) -> Self {
        self.config.render.mode = mode;
        self
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.config.render.headless = headless;
        self
    }

    pub fn viewport(mut self, viewport: Viewport) -> Self {
        self.config.render.viewport_width = viewport.width;
        self.config.render.viewport_height = viewport.height;
        self
    }

    pub fn wait_until(mut self, wait: WaitStrategy) -> Self {
        self.config.render.wait_until = wait;
        self
    }

    pub fn auto_detect_spa(mut self, detect: bool) -> Self {
        self.config.render.auto_detect_spa = detect;
        self
    }

    pub fn output_path(mut self, path: impl Into<String>) -> Self {
        self.config.output.path = path.into();
        self
    }

    pub fn knowledge_graph(mut self, enabled: bool) -> Self {
        self.config.output.knowledge_graph = enabled;
        self
    }

    /// Validates and returns the configuration
    pub fn build(self) -> ConfigResult<CrawlConfig> {
        validate(&self.config)?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigError;

    #[test]
    fn test_builder_defaults() {
        let config = CrawlConfig::builder("https://example.com").build().unwrap();
        assert_eq!(config.crawler.max_depth, 3);
        assert_eq!(config.patterns.max_samples_per_pattern, 3);
        assert_eq!(config.render.viewport(), Viewport::default());
    }

    #[test]
    fn test_builder_setters() {
        let config = CrawlConfig::builder("https://example.com")
            .max_pages(10)
            .request_delay(Duration::from_millis(150))
            .exclude_pattern("*.pdf")
            .exclude_pattern("/logout")
            .render_mode(RenderMode::Rendered)
            .build()
            .unwrap();

        assert_eq!(config.crawler.max_pages, Some(10));
        assert_eq!(config.crawler.request_delay(), Duration::from_millis(150));
        assert_eq!(config.scope.exclude_patterns, vec!["*.pdf", "/logout"]);
        assert_eq!(config.render.mode, RenderMode::Rendered);
    }

    #[test]
    fn test_builder_rejects_invalid_combination() {
        let result = CrawlConfig::builder("https://example.com/admin/")
            .exclude_pattern("/admin*")
            .build();
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
