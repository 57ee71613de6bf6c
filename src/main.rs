//! Reconmap main entry point
//!
//! This is the command-line interface for the reconmap crawler.

use anyhow::{Context, Result};
use clap::Parser;
use reconmap::browser::BrowserSession;
use reconmap::config::{load_config_with_hash, CrawlConfig, RenderMode};
use reconmap::crawler::{crawl_with, HttpTransport};
use reconmap::output::format_summary;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Reconmap: a reconnaissance web crawler
///
/// Reconmap crawls a single web application from a seed URL and records its
/// pages, forms, buttons and API call sites as a JSON map, optionally driving
/// a headless browser for single-page applications.
#[derive(Parser, Debug)]
#[command(name = "reconmap")]
#[command(version)]
#[command(about = "A reconnaissance web crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Write the crawl result here instead of the configured path
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let output = cli
        .output
        .unwrap_or_else(|| PathBuf::from(&config.output.path));
    handle_crawl(config, config_hash, output).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("reconmap=info,warn"),
            1 => EnvFilter::new("reconmap=debug,info"),
            2 => EnvFilter::new("reconmap=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &CrawlConfig) {
    println!("=== Reconmap Dry Run ===\n");
    println!("Target: {}", config.target_url);

    println!("\nCrawler:");
    println!("  Max depth: {}", config.crawler.max_depth);
    match config.crawler.max_pages {
        Some(max) => println!("  Max pages: {}", max),
        None => println!("  Max pages: unlimited"),
    }
    match config.crawler.max_duration() {
        Some(limit) => println!("  Deadline: {}s", limit.as_secs()),
        None => println!("  Deadline: none"),
    }
    println!("  Concurrent pages: {}", config.crawler.max_concurrent_pages);
    println!("  Request delay: {}ms", config.crawler.request_delay_ms);
    println!("  User agent: {}", config.crawler.user_agent);

    println!("\nScope:");
    println!("  Respect robots.txt: {}", config.scope.respect_robots);
    println!("  Include subdomains: {}", config.scope.include_subdomains);
    for pattern in &config.scope.exclude_patterns {
        println!("  Exclude: {}", pattern);
    }

    println!("\nPatterns:");
    if config.patterns.enabled {
        println!(
            "  Max samples per pattern: {}",
            config.patterns.max_samples_per_pattern
        );
    } else {
        println!("  Disabled");
    }

    println!("\nRender mode: {:?}", config.render.mode);
    println!("Output: {}", config.output.path);

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(config: CrawlConfig, config_hash: String, output: PathBuf) -> Result<()> {
    let transport = Arc::new(
        HttpTransport::from_config(&config.crawler).context("failed to build HTTP client")?,
    );
    let browser = launch_browser(&config).await?;

    let result = crawl_with(config, transport, browser.clone()).await;

    if let Some(browser) = browser {
        if let Err(e) = browser.close().await {
            tracing::warn!("Failed to close browser: {}", e);
        }
    }

    let result = result.context("crawl failed")?.with_config_hash(config_hash);
    result
        .save_to_file(&output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!("{}", format_summary(&result.statistics));
    Ok(())
}

#[cfg(feature = "chromium")]
async fn launch_browser(config: &CrawlConfig) -> Result<Option<Arc<dyn BrowserSession>>> {
    use reconmap::browser::ChromiumSession;

    if config.render.mode == RenderMode::Static {
        return Ok(None);
    }

    tracing::info!("Launching browser (headless: {})", config.render.headless);
    let session = ChromiumSession::launch(config.render.headless, config.render.viewport())
        .await
        .context("failed to launch browser")?;
    Ok(Some(Arc::new(session)))
}

#[cfg(not(feature = "chromium"))]
async fn launch_browser(config: &CrawlConfig) -> Result<Option<Arc<dyn BrowserSession>>> {
    match config.render.mode {
        RenderMode::Static => Ok(None),
        RenderMode::Auto => {
            tracing::warn!("Built without the chromium feature, auto mode will stay static");
            Ok(None)
        }
        RenderMode::Rendered => {
            anyhow::bail!("rendered mode needs a build with the chromium feature")
        }
    }
}
