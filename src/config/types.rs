use crate::browser::{Viewport, WaitStrategy};
use serde::Deserialize;
use std::time::Duration;

/// Top-level crawl configuration
///
/// Built once per invocation, either from a TOML file (see
/// [`load_config`](crate::config::load_config)) or programmatically through
/// [`CrawlConfigBuilder`](crate::config::CrawlConfigBuilder). Both paths run the
/// same validation, so a `CrawlConfig` handed to the crawler is always coherent.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Seed URL the crawl starts from
    #[serde(rename = "target-url")]
    pub target_url: String,

    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(default)]
    pub scope: ScopeConfig,

    #[serde(default)]
    pub patterns: PatternConfig,

    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Traversal budgets, pacing and transport settings
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum link depth from the seed (seed is depth 0)
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Maximum number of pages to fetch
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<usize>,

    /// Global crawl deadline in seconds
    #[serde(rename = "max-duration-secs", default)]
    pub max_duration_secs: Option<u64>,

    /// Maximum number of page fetches in flight at once
    #[serde(rename = "max-concurrent-pages", default = "default_max_concurrent_pages")]
    pub max_concurrent_pages: u32,

    /// Minimum interval between any two requests to the target (milliseconds)
    #[serde(rename = "request-delay-ms", default)]
    pub request_delay_ms: u64,

    /// Per-request and per-navigation timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt for transient failures
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause between retry attempts (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

impl CrawlerConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration_secs.map(Duration::from_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_pages: None,
            max_duration_secs: None,
            max_concurrent_pages: default_max_concurrent_pages(),
            request_delay_ms: 0,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            user_agent: default_user_agent(),
        }
    }
}

/// Which URLs the crawl is allowed to visit
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeConfig {
    /// Honour the target's robots.txt
    #[serde(rename = "respect-robots", default = "default_true")]
    pub respect_robots: bool,

    /// Treat subdomains of the seed host as in scope
    #[serde(rename = "include-subdomains", default)]
    pub include_subdomains: bool,

    /// Glob patterns (`*`, `?`) matched against the path or the full URL
    #[serde(rename = "exclude-patterns", default)]
    pub exclude_patterns: Vec<String>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            respect_robots: true,
            include_subdomains: false,
            exclude_patterns: Vec::new(),
        }
    }
}

/// URL pattern sampling settings
#[derive(Debug, Clone, Deserialize)]
pub struct PatternConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// How many URLs of one structural pattern are actually crawled
    #[serde(rename = "max-samples-per-pattern", default = "default_max_samples")]
    pub max_samples_per_pattern: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_samples_per_pattern: default_max_samples(),
        }
    }
}

/// How pages are fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderMode {
    /// Plain HTTP fetch with markup extraction
    #[default]
    Static,
    /// Every page is loaded in a browser session
    Rendered,
    /// Static fetch, switching to rendered when the seed looks like an SPA
    Auto,
}

/// Browser settings, used by the rendered and auto modes
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub mode: RenderMode,

    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(rename = "viewport-width", default = "default_viewport_width")]
    pub viewport_width: u32,

    #[serde(rename = "viewport-height", default = "default_viewport_height")]
    pub viewport_height: u32,

    #[serde(rename = "wait-until", default)]
    pub wait_until: WaitStrategy,

    #[serde(rename = "auto-detect-spa", default = "default_true")]
    pub auto_detect_spa: bool,
}

impl RenderConfig {
    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.viewport_width,
            height: self.viewport_height,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            mode: RenderMode::default(),
            headless: true,
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            wait_until: WaitStrategy::default(),
            auto_detect_spa: true,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path of the JSON crawl result
    #[serde(default = "default_output_path")]
    pub path: String,

    /// Whether to build the knowledge graph into the result
    #[serde(rename = "knowledge-graph", default = "default_true")]
    pub knowledge_graph: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            knowledge_graph: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_depth() -> u32 {
    3
}

fn default_max_concurrent_pages() -> u32 {
    4
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_user_agent() -> String {
    format!("reconmap/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_samples() -> usize {
    3
}

fn default_viewport_width() -> u32 {
    1280
}

fn default_viewport_height() -> u32 {
    720
}

fn default_output_path() -> String {
    "crawl.json".to_string()
}
