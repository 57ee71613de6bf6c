use crate::config::types::{
    CrawlConfig, CrawlerConfig, OutputConfig, PatternConfig, RenderConfig, ScopeConfig,
};
use crate::url::{normalize_url, ExcludeSet};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &CrawlConfig) -> Result<(), ConfigError> {
    let seed = validate_target_url(&config.target_url)?;
    validate_crawler_config(&config.crawler)?;
    validate_scope_config(&config.scope, &seed)?;
    validate_pattern_config(&config.patterns)?;
    validate_render_config(&config.render)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the seed URL and returns it in normalized form
fn validate_target_url(target: &str) -> Result<Url, ConfigError> {
    if target.trim().is_empty() {
        return Err(ConfigError::InvalidUrl("target_url cannot be empty".to_string()));
    }

    normalize_url(target)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid target_url '{}': {}", target, e)))
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_pages < 1 || config.max_concurrent_pages > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_pages must be between 1 and 100, got {}",
            config.max_concurrent_pages
        )));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout_secs must be greater than 0".to_string(),
        ));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1 when set".to_string(),
        ));
    }

    if config.max_duration_secs == Some(0) {
        return Err(ConfigError::Validation(
            "max_duration_secs must be >= 1 when set".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates scope settings against the seed
///
/// An exclude pattern that matches the seed itself leaves nothing to crawl,
/// so it is rejected as contradictory.
fn validate_scope_config(config: &ScopeConfig, seed: &Url) -> Result<(), ConfigError> {
    let excludes = ExcludeSet::compile(&config.exclude_patterns)?;

    if let Some(pattern) = excludes.matching_pattern(seed) {
        return Err(ConfigError::Validation(format!(
            "exclude pattern '{}' excludes the target URL {}",
            pattern, seed
        )));
    }

    Ok(())
}

/// Validates pattern sampling configuration
fn validate_pattern_config(config: &PatternConfig) -> Result<(), ConfigError> {
    if config.enabled && config.max_samples_per_pattern < 1 {
        return Err(ConfigError::Validation(
            "max_samples_per_pattern must be >= 1 when pattern normalization is enabled"
                .to_string(),
        ));
    }

    Ok(())
}

/// Validates browser settings
fn validate_render_config(config: &RenderConfig) -> Result<(), ConfigError> {
    if config.viewport_width == 0 || config.viewport_height == 0 {
        return Err(ConfigError::Validation(format!(
            "viewport must be non-zero, got {}x{}",
            config.viewport_width, config.viewport_height
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
