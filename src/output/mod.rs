//! Crawl output
//!
//! This module handles:
//! - The per-page record ([`PageResult`]) and the page registry ([`SiteMap`])
//! - The knowledge graph built from a finished crawl
//! - The [`CrawlResult`] document and its JSON export

mod graph;
mod sitemap;
pub mod stats;

pub use graph::{
    EdgeType, GraphBuilder, GraphEdge, GraphNode, GraphStatistics, KnowledgeGraph, NodeType,
};
pub use sitemap::{SiteMap, SiteMapStatistics};
pub use stats::{format_summary, CrawlStatistics, SkipCounters};

use crate::extract::{ButtonInfo, EndpointInfo, FormData};
use crate::pattern::PatternNormalizationResult;
use crate::state::CrawlState;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

/// Outcome of visiting one URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageResult {
    /// Normalized URL that was requested
    pub url: String,
    /// HTTP status, 0 when no response was received
    pub status: u16,
    pub depth: u32,
    pub parent_url: Option<String>,
    pub title: Option<String>,
    pub links: Vec<String>,
    pub forms: Vec<FormData>,
    pub buttons: Vec<ButtonInfo>,
    pub api_endpoints: Vec<EndpointInfo>,
    /// Requested URL through final URL when the request was redirected
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub redirect_chain: Vec<String>,
    pub crawled_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl PageResult {
    /// An empty record for `url`, stamped now
    pub fn new(
        url: impl Into<String>,
        status: u16,
        depth: u32,
        parent_url: Option<String>,
    ) -> Self {
        Self {
            url: url.into(),
            status,
            depth,
            parent_url,
            title: None,
            links: Vec::new(),
            forms: Vec::new(),
            buttons: Vec::new(),
            api_endpoints: Vec::new(),
            redirect_chain: Vec::new(),
            crawled_at: Utc::now(),
            error: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Everything a crawl produced
#[derive(Debug, Clone, Serialize)]
pub struct CrawlResult {
    /// Normalized seed URL
    pub target: String,
    /// SHA-256 of the config file, when the config came from one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
    pub state: CrawlState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub pages: Vec<PageResult>,
    pub statistics: CrawlStatistics,
    /// Present when pattern sampling was enabled
    pub patterns: Option<PatternNormalizationResult>,
    /// Present when the knowledge graph was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<KnowledgeGraph>,
}

impl CrawlResult {
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the JSON document to `path`, creating parent directories
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        tracing::info!("Wrote crawl result to {}", path.display());
        Ok(())
    }
}
