//! Page sources
//!
//! A [`PageSource`] discovers pages and streams a [`PageRecord`] for each one
//! over the context's channel. The crawl and the sitemap reader are two
//! implementations of the same contract; downstream consumers never learn
//! which one produced a record.

use crate::crawler::scheduler::CrawlScheduler;
use crate::crawler::sitemap::SitemapReader;
use crate::crawler::types::PageRecord;
use crate::progress::ProgressObserver;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Everything a page source needs from its caller
#[derive(Clone)]
pub struct DiscoveryContext {
    /// Settled pages are sent here as soon as they are ready
    pub pages: mpsc::Sender<PageRecord>,

    pub observer: Arc<dyn ProgressObserver>,

    /// Stops new work from being scheduled; in-flight fetches still settle
    pub cancel: CancellationToken,

    /// Canonical URLs a previous source already produced records for
    pub already_visited: HashSet<Url>,
}

impl DiscoveryContext {
    pub fn new(
        pages: mpsc::Sender<PageRecord>,
        observer: Arc<dyn ProgressObserver>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            pages,
            observer,
            cancel,
            already_visited: HashSet::new(),
        }
    }

    /// Sends a record downstream
    ///
    /// Returns false once the receiver is gone, which callers treat like
    /// cancellation.
    pub async fn emit(&self, record: PageRecord) -> bool {
        self.pages.send(record).await.is_ok()
    }
}

/// Summary of one discovery run
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    /// Effective origin root, after any seed redirect
    pub origin: Url,

    /// Lowercase host that same-origin classification used at the end
    pub origin_host: String,

    /// Canonical URLs claimed or known as pages, seed included
    pub visited: HashSet<Url>,

    /// Number of PageRecords emitted
    pub pages_fetched: usize,

    /// Total references across all emitted pages
    pub references_found: usize,

    /// True if discovery stopped because of cancellation
    pub cancelled: bool,
}

impl CrawlOutcome {
    /// Returns true for the "seed only, nothing to follow" shape
    pub fn looks_empty(&self) -> bool {
        self.pages_fetched == 1 && self.references_found == 0
    }
}

/// A strategy for discovering the pages of a site
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Discovers pages starting from `seed`, streaming records into `ctx`
    async fn discover(&self, seed: &Url, ctx: DiscoveryContext) -> Result<CrawlOutcome>;
}

/// Discovers pages by following same-origin links
pub struct CrawlSource {
    scheduler: CrawlScheduler,
}

impl CrawlSource {
    pub fn new(scheduler: CrawlScheduler) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl PageSource for CrawlSource {
    fn name(&self) -> &'static str {
        "crawl"
    }

    async fn discover(&self, seed: &Url, ctx: DiscoveryContext) -> Result<CrawlOutcome> {
        self.scheduler.run(seed, ctx).await
    }
}

/// Discovers pages from the site's sitemap
pub struct SitemapSource {
    reader: SitemapReader,
}

impl SitemapSource {
    pub fn new(reader: SitemapReader) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl PageSource for SitemapSource {
    fn name(&self) -> &'static str {
        "sitemap"
    }

    async fn discover(&self, seed: &Url, ctx: DiscoveryContext) -> Result<CrawlOutcome> {
        self.reader.run(seed, ctx).await
    }
}

/// Runs `primary`, then `fallback` if the primary found nothing to follow
///
/// The fallback starts from the primary's effective origin and skips every
/// page the primary already produced, so no page is emitted twice.
pub async fn discover_with_fallback(
    primary: &dyn PageSource,
    fallback: Option<&dyn PageSource>,
    seed: &Url,
    ctx: DiscoveryContext,
) -> Result<CrawlOutcome> {
    let outcome = primary.discover(seed, ctx.clone()).await?;

    let Some(fallback) = fallback else {
        return Ok(outcome);
    };

    if outcome.cancelled || !outcome.looks_empty() || ctx.cancel.is_cancelled() {
        return Ok(outcome);
    }

    tracing::info!(
        "{} source found a single page with no references, trying {} source",
        primary.name(),
        fallback.name()
    );

    let mut fallback_ctx = ctx;
    fallback_ctx.already_visited = outcome.visited.clone();

    let extra = fallback.discover(&outcome.origin, fallback_ctx).await?;

    let mut visited = outcome.visited;
    visited.extend(extra.visited);

    Ok(CrawlOutcome {
        origin: outcome.origin,
        origin_host: outcome.origin_host,
        visited,
        pages_fetched: outcome.pages_fetched + extra.pages_fetched,
        references_found: outcome.references_found + extra.references_found,
        cancelled: extra.cancelled,
    })
}
