//! Crawl statistics

use super::SiteMapStatistics;
use serde::Serialize;

/// URLs turned away before fetching, by reason
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkipCounters {
    /// Deeper than `max-depth`
    pub depth: usize,
    /// Outside the target host or matched an exclude pattern
    pub scope: usize,
    /// Disallowed by robots.txt
    pub robots: usize,
    /// Pattern group already fully sampled
    pub pattern: usize,
}

impl SkipCounters {
    pub fn total(&self) -> usize {
        self.depth + self.scope + self.robots + self.pattern
    }
}

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStatistics {
    #[serde(flatten)]
    pub sitemap: SiteMapStatistics,

    /// Pages recorded with an error (HTTP >= 400, network failure, navigation failure)
    pub total_errors: usize,

    pub skipped: SkipCounters,

    /// The seed looked like a single-page application
    pub spa_detected: bool,

    /// The crawl deadline cut the traversal short
    pub deadline_reached: bool,

    pub duration_ms: u64,
}

/// One-line human readable summary
pub fn format_summary(stats: &CrawlStatistics) -> String {
    let mut line = format!(
        "{} pages ({} errors), {} links, {} forms, {} endpoints; skipped {} (depth {}, scope {}, robots {}, pattern {}) in {:.1}s",
        stats.sitemap.total_pages,
        stats.total_errors,
        stats.sitemap.total_links,
        stats.sitemap.total_forms,
        stats.sitemap.total_endpoints,
        stats.skipped.total(),
        stats.skipped.depth,
        stats.skipped.scope,
        stats.skipped.robots,
        stats.skipped.pattern,
        stats.duration_ms as f64 / 1000.0,
    );
    if stats.spa_detected {
        line.push_str(" [spa]");
    }
    if stats.deadline_reached {
        line.push_str(" [deadline reached]");
    }
    line
}
