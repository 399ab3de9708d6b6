//! Sumi-Sweep main entry point
//!
//! This is the command-line interface for the Sumi-Sweep link auditor.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use sumi_sweep::config::{load_config_with_hash, validate, Config, ReportFormat};
use sumi_sweep::output::{print_summary, write_report};
use sumi_sweep::{Coordinator, LogObserver};
use tracing_subscriber::EnvFilter;

/// Sumi-Sweep: a site link auditor
///
/// Sumi-Sweep crawls a website from a seed URL, following links on the same
/// origin, and checks every link and image it finds. Broken links,
/// redirects and access-restricted links are reported with the pages that
/// reference them.
#[derive(Parser, Debug)]
#[command(name = "sumi-sweep")]
#[command(version)]
#[command(about = "Crawl a site and report its broken links", long_about = None)]
struct Cli {
    /// URL to start crawling from
    #[arg(value_name = "SEED")]
    seed: String,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum number of pages to crawl
    #[arg(long, value_name = "N")]
    max_pages: Option<usize>,

    /// Maximum number of concurrent page fetches
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Report format
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Where to write the report
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Do not fall back to sitemap.xml when the crawl finds nothing
    #[arg(long)]
    no_sitemap: bool,

    /// Validate config and show what would be swept without sending requests
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum FormatArg {
    Markdown,
    Json,
}

impl From<FormatArg> for ReportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Markdown => ReportFormat::Markdown,
            FormatArg::Json => ReportFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = load_configuration(&cli)?;

    if cli.dry_run {
        handle_dry_run(&cli.seed, &config);
        return Ok(ExitCode::SUCCESS);
    }

    handle_sweep(cli, config, config_hash).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_sweep=info,warn"),
            1 => EnvFilter::new("sumi_sweep=debug,info"),
            2 => EnvFilter::new("sumi_sweep=trace,debug"),
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

/// Loads the config file (if any) and applies command-line overrides
fn load_configuration(cli: &Cli) -> anyhow::Result<(Config, Option<String>)> {
    let (mut config, hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, Some(hash))
        }
        None => (Config::default(), None),
    };

    if let Some(max_pages) = cli.max_pages {
        config.crawler.max_pages = max_pages;
    }
    if let Some(concurrency) = cli.concurrency {
        config.crawler.max_concurrent_pages = concurrency;
    }
    if let Some(format) = cli.format {
        config.output.format = format.into();
    }
    if let Some(output) = &cli.output {
        config.output.report_path = Some(output.display().to_string());
    }
    if cli.no_sitemap {
        config.crawler.sitemap_fallback = false;
    }

    validate(&config).context("Invalid configuration after command-line overrides")?;

    Ok((config, hash))
}

/// Handles the --dry-run mode: shows what would be swept
fn handle_dry_run(seed: &str, config: &Config) {
    println!("=== Sumi-Sweep Dry Run ===\n");

    println!("Seed: {}", seed);
    match sumi_sweep::normalize_url(seed) {
        Ok(url) => println!("  Canonical: {}", url),
        Err(e) => println!("  Invalid: {}", e),
    }

    println!("\nCrawler Configuration:");
    println!("  Max pages: {}", config.crawler.max_pages);
    println!(
        "  Max concurrent pages: {}",
        config.crawler.max_concurrent_pages
    );
    println!("  Page timeout: {}ms", config.crawler.page_timeout);
    println!("  Max redirects: {}", config.crawler.max_redirects);
    println!("  Respect robots.txt: {}", config.crawler.respect_robots);
    println!("  Sitemap fallback: {}", config.crawler.sitemap_fallback);

    println!("\nValidator Configuration:");
    println!(
        "  Max concurrent checks: {}",
        config.validator.max_concurrent_checks
    );
    println!("  Probe timeout: {}ms", config.validator.probe_timeout);
    println!("  Max retries: {}", config.validator.max_retries);
    println!(
        "  Domain delay: {}ms (+ up to {}ms jitter)",
        config.validator.domain_delay, config.validator.delay_jitter
    );
    println!(
        "  Circuit threshold: {}",
        config.validator.circuit_threshold
    );
    println!("  Check images: {}", config.validator.check_images);

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nExcluded Domains ({}):", config.exclude.len());
    for entry in &config.exclude {
        println!("  - {}", entry.domain);
    }

    println!("\nOutput:");
    match &config.output.report_path {
        Some(path) => println!("  Report: {} ({:?})", path, config.output.format),
        None => println!("  Report: console summary only"),
    }
}

/// Handles the main sweep operation
async fn handle_sweep(
    cli: Cli,
    config: Config,
    config_hash: Option<String>,
) -> anyhow::Result<ExitCode> {
    let report_path = config.output.report_path.clone();
    let format = config.output.format;

    let mut coordinator = Coordinator::new(config, Arc::new(LogObserver::default()));
    if let Some(hash) = config_hash {
        coordinator = coordinator.with_config_hash(hash);
    }

    // Ctrl-C stops scheduling new work; the partial report is still written
    let cancel = coordinator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight requests");
            cancel.cancel();
        }
    });

    let report = coordinator
        .run(&cli.seed)
        .await
        .with_context(|| format!("Sweep of {} failed", cli.seed))?;

    if !cli.quiet {
        print_summary(&report);
    }

    if let Some(path) = report_path {
        write_report(&report, format, Path::new(&path))
            .with_context(|| format!("Failed to write report to {}", path))?;
        tracing::info!("Report written to: {}", path);
    }

    if report.has_broken_links() {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
