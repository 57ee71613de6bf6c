//! Configuration module
//!
//! This module handles loading, parsing, and validating the crawl configuration,
//! either from a TOML file or through [`CrawlConfigBuilder`].
//!
//! # Example
//!
//! ```no_run
//! use reconmap::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("recon.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod builder;
mod parser;
mod types;
mod validation;

// Re-export types
pub use builder::CrawlConfigBuilder;
pub use types::{
    CrawlConfig, CrawlerConfig, OutputConfig, PatternConfig, RenderConfig, RenderMode, ScopeConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
