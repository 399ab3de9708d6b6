//! Crawler module for page discovery
//!
//! This module contains the discovery half of a sweep, including:
//! - HTTP fetching with manual redirect handling and capped reads
//! - HTML parsing and reference extraction
//! - The bounded-concurrency crawl scheduler and its frontier
//! - The sitemap fallback source
//! - Overall sweep coordination

mod coordinator;
mod fetcher;
mod frontier;
mod parser;
mod scheduler;
mod sitemap;
mod source;
mod types;

pub use coordinator::Coordinator;
pub use fetcher::{build_http_client, FetchError, FetchMode, FetchResponse, Fetcher};
pub use frontier::CrawlFrontier;
pub use parser::{extract_references, parse_html, ParsedPage};
pub use scheduler::{describe_status, fetch_page, settle_fetch, CrawlScheduler};
pub use sitemap::{extract_loc_values, SitemapReader};
pub use source::{
    discover_with_fallback, CrawlOutcome, CrawlSource, DiscoveryContext, PageSource,
    SitemapSource,
};
pub use types::{PageRecord, Reference, ReferenceKind};

use crate::config::Config;
use crate::output::Report;
use crate::progress::LogObserver;
use crate::Result;
use std::sync::Arc;

/// Runs a complete sweep with progress logged through `tracing`
///
/// This is the simplest entry point. It will:
/// 1. Crawl the site from `seed`
/// 2. Check every link and image found, while crawling
/// 3. Return the aggregated report
///
/// Use [`Coordinator`] directly for a custom observer or cancellation.
///
/// # Arguments
///
/// * `config` - The sweep configuration
/// * `seed` - Absolute http(s) URL to start from
pub async fn sweep(config: Config, seed: &str) -> Result<Report> {
    Coordinator::new(config, Arc::new(LogObserver::default()))
        .run(seed)
        .await
}
