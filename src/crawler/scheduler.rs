//! Crawl scheduler: bounded-concurrency traversal of one site
//!
//! This module handles:
//! - Claiming URLs from the frontier up to the concurrency limit
//! - Fetching pages concurrently and streaming their records
//! - Following same-origin links that robots.txt allows
//! - Adopting a new origin when the seed redirects to another host
//! - Draining in-flight fetches on cancellation or at the page cap

use crate::config::{CrawlerConfig, DomainEntry};
use crate::crawler::fetcher::{FetchMode, Fetcher};
use crate::crawler::frontier::CrawlFrontier;
use crate::crawler::parser::parse_html;
use crate::crawler::source::{CrawlOutcome, DiscoveryContext};
use crate::crawler::types::{PageRecord, ReferenceKind};
use crate::robots::{fetch_robots, is_allowed, ParsedRobots};
use crate::state::CrawlPhase;
use crate::url::{canonicalize, classify_link, extract_domain, origin_root, LinkScope};
use crate::{Result, UrlError};
use futures::FutureExt;
use reqwest::StatusCode;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Scheduler for one crawl
///
/// The scheduler loop is the only owner of the [`CrawlFrontier`]; fetch
/// tasks hand their records back through the `JoinSet`, so no two tasks can
/// ever claim the same canonical URL.
#[derive(Debug, Clone)]
pub struct CrawlScheduler {
    fetcher: Fetcher,
    config: CrawlerConfig,
    exclusions: Vec<DomainEntry>,
    /// Product token matched against robots.txt groups
    robots_agent: String,
}

impl CrawlScheduler {
    pub fn new(
        fetcher: Fetcher,
        config: CrawlerConfig,
        exclusions: Vec<DomainEntry>,
        robots_agent: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            config,
            exclusions,
            robots_agent: robots_agent.into(),
        }
    }

    /// Crawls from `seed` until the frontier drains
    ///
    /// # Main Loop
    ///
    /// 1. Claim up to `limit - in_flight` pending URLs and spawn a fetch for each
    /// 2. Wait for the next fetch to settle (or for cancellation)
    /// 3. Complete it, adopt a new origin if the seed left its host
    /// 4. Mark a redirect's landing page visited
    /// 5. Queue same-origin links that robots.txt allows
    /// 6. Report progress and emit the PageRecord
    ///
    /// Ends when nothing is pending or in flight.
    pub async fn run(&self, seed: &Url, ctx: DiscoveryContext) -> Result<CrawlOutcome> {
        let seed = canonicalize(seed);
        let mut origin = origin_root(&seed);
        let mut origin_host = extract_domain(&seed).ok_or(UrlError::MissingDomain)?;
        let mut robots = self.load_robots(&origin, &ctx.cancel).await;

        let limit = self.config.max_concurrent_pages.max(1);
        let mut frontier =
            CrawlFrontier::with_visited(self.config.max_pages, ctx.already_visited.clone());
        frontier.try_enqueue(seed.clone());

        let mut phase = CrawlPhase::Running;
        let mut tasks: JoinSet<PageRecord> = JoinSet::new();
        let mut pages_fetched = 0;
        let mut references_found = 0;
        let mut cancelled = false;

        tracing::info!("Starting crawl of {} (limit {})", seed, limit);

        loop {
            if phase.accepts_work() && ctx.cancel.is_cancelled() {
                phase = self.start_draining(&mut frontier, "cancelled");
                cancelled = true;
            }

            if phase.accepts_work() {
                let room = limit.saturating_sub(tasks.len());
                for url in frontier.claim_batch(room) {
                    let fetcher = self.fetcher.clone();
                    let config = self.config.clone();
                    tasks.spawn(async move {
                        let fetch = fetch_page(&fetcher, &url, &config);
                        settle_fetch(url.clone(), fetch).await
                    });
                }
            }

            if tasks.is_empty() {
                break;
            }

            let joined = tokio::select! {
                _ = ctx.cancel.cancelled(), if phase.accepts_work() => {
                    phase = self.start_draining(&mut frontier, "cancelled");
                    cancelled = true;
                    continue;
                }
                joined = tasks.join_next() => joined,
            };

            let Some(joined) = joined else {
                break;
            };
            let mut record = match joined {
                Ok(record) => record,
                Err(e) => {
                    // The URL stays visited, so it is never retried
                    tracing::error!("Page fetch task failed: {}", e);
                    continue;
                }
            };

            frontier.complete(&record.url);
            pages_fetched += 1;

            if record.url == seed && record.status.is_some() {
                if let Some(host) = extract_domain(&record.final_url) {
                    if host != origin_host {
                        tracing::info!("Seed redirected from {} to {}, adopting new origin", origin_host, host);
                        origin_host = host;
                        origin = origin_root(&record.final_url);
                        robots = self.load_robots(&origin, &ctx.cancel).await;
                    }
                }
            }

            if record.was_redirected() {
                frontier.mark_visited(canonicalize(&record.final_url));
            }

            if record.strip_offsite_references(&origin_host) {
                tracing::debug!(
                    "{} redirected off-site to {}, ignoring its links",
                    record.url,
                    record.final_url
                );
            }
            references_found += record.references.len();

            if phase.accepts_work() {
                self.enqueue_links(&record, &origin_host, &robots, &mut frontier);
            }

            ctx.observer
                .on_crawl_progress(frontier.discovered_count(), pages_fetched);

            if !ctx.emit(record).await && phase.accepts_work() {
                phase = self.start_draining(&mut frontier, "page receiver closed");
            }
        }

        phase = CrawlPhase::Finished;
        tracing::info!(
            "Crawl {}: {} pages fetched, {} references found",
            phase,
            pages_fetched,
            references_found
        );

        Ok(CrawlOutcome {
            origin,
            origin_host,
            visited: frontier.into_visited(),
            pages_fetched,
            references_found,
            cancelled,
        })
    }

    fn start_draining(&self, frontier: &mut CrawlFrontier, reason: &str) -> CrawlPhase {
        tracing::info!(
            "Crawl {}, draining {} in-flight pages",
            reason,
            frontier.in_flight_count()
        );
        frontier.close();
        CrawlPhase::Draining
    }

    async fn load_robots(&self, origin: &Url, cancel: &CancellationToken) -> ParsedRobots {
        if !self.config.respect_robots || cancel.is_cancelled() {
            return ParsedRobots::allow_all();
        }
        fetch_robots(&self.fetcher, origin, self.config.page_timeout()).await
    }

    /// Queues every followable link of a settled page
    fn enqueue_links(
        &self,
        record: &PageRecord,
        origin_host: &str,
        robots: &ParsedRobots,
        frontier: &mut CrawlFrontier,
    ) {
        for reference in &record.references {
            if reference.kind != ReferenceKind::Link {
                continue;
            }

            let target = canonicalize(&reference.target);
            if classify_link(&target, origin_host, &self.exclusions) != LinkScope::Internal {
                continue;
            }

            if !is_allowed(robots, &target, &self.robots_agent) {
                tracing::debug!("URL {} disallowed by robots.txt", target);
                continue;
            }

            if frontier.try_enqueue(target.clone()) {
                tracing::trace!("Queued {}", target);
            }
        }
    }
}

/// Fetches one page and turns the result into a terminal PageRecord
///
/// Never fails: timeouts, connection errors, non-2xx responses and redirect
/// errors all become a record with `error` set and no references.
pub async fn fetch_page(fetcher: &Fetcher, url: &Url, config: &CrawlerConfig) -> PageRecord {
    tracing::debug!("Fetching page {}", url);

    let mode = FetchMode::Page {
        max_bytes: config.max_page_bytes,
    };

    match fetcher.fetch(url, mode, config.page_timeout()).await {
        Ok(response) if response.is_success() => {
            if response.redirects > 0 {
                tracing::debug!(
                    "{} landed on {} after {} redirects",
                    url,
                    response.final_url,
                    response.redirects
                );
            }
            let (title, references) = match response.body.as_deref() {
                Some(html) => {
                    let parsed = parse_html(html, &response.final_url);
                    (parsed.title, parsed.references)
                }
                None => (None, Vec::new()),
            };

            PageRecord {
                url: url.clone(),
                final_url: response.final_url,
                status: Some(response.status),
                content_type: response.content_type,
                title,
                references,
                error: None,
            }
        }
        Ok(response) => {
            let mut record =
                PageRecord::failed(url.clone(), Some(response.status), describe_status(response.status));
            record.final_url = response.final_url;
            record.content_type = response.content_type;
            record
        }
        Err(e) => {
            tracing::debug!("Failed to fetch {}: {}", url, e);
            PageRecord::failed(url.clone(), None, e.to_string())
        }
    }
}

/// Runs a page fetch, turning a panic into a failed record for `url`
pub async fn settle_fetch<F>(url: Url, fetch: F) -> PageRecord
where
    F: Future<Output = PageRecord>,
{
    match AssertUnwindSafe(fetch).catch_unwind().await {
        Ok(record) => record,
        Err(panic_info) => {
            let message = panic_message(panic_info.as_ref());
            tracing::error!("Fetch of {} panicked: {}", url, message);
            PageRecord::failed(url, None, format!("internal error while fetching page: {}", message))
        }
    }
}

fn panic_message(panic_info: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Formats a status as `HTTP 404 Not Found`
pub fn describe_status(status: u16) -> String {
    match StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
    {
        Some(reason) => format!("HTTP {} {}", status, reason),
        None => format!("HTTP {}", status),
    }
}
