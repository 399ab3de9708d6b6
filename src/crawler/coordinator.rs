//! Sweep coordinator - main orchestration logic
//!
//! This module wires the pipeline together:
//! - Page discovery (crawl, with an optional sitemap fallback) streams
//!   PageRecords over a bounded channel
//! - Every record's references go to the link validator as soon as the
//!   record arrives, so checking overlaps crawling
//! - Verdicts stream back and are folded into the report alongside pages
//! - One cancellation token stops both halves

use crate::config::Config;
use crate::crawler::fetcher::{build_http_client, Fetcher};
use crate::crawler::scheduler::CrawlScheduler;
use crate::crawler::sitemap::SitemapReader;
use crate::crawler::source::{
    discover_with_fallback, CrawlOutcome, CrawlSource, DiscoveryContext, PageSource,
    SitemapSource,
};
use crate::crawler::types::PageRecord;
use crate::output::{Aggregator, HostSummary, Report, ReportMeta};
use crate::progress::ProgressObserver;
use crate::url::{extract_domain, normalize_url};
use crate::validator::{LinkValidator, ValidationStats, ValidatorHandle};
use crate::{Result, SweepError, UrlError};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Records buffered between discovery and the coordinator
const PAGE_CHANNEL_CAPACITY: usize = 64;

/// Main sweep coordinator
pub struct Coordinator {
    config: Config,
    observer: Arc<dyn ProgressObserver>,
    config_hash: Option<String>,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Creates a new coordinator
    ///
    /// # Arguments
    ///
    /// * `config` - The sweep configuration
    /// * `observer` - Receives progress, page and verdict events
    pub fn new(config: Config, observer: Arc<dyn ProgressObserver>) -> Self {
        Self {
            config,
            observer,
            config_hash: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Records the config file hash in the report
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    /// Token that stops the sweep when cancelled
    ///
    /// New fetches and checks stop being scheduled; in-flight ones settle and
    /// the partial report is still returned.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs a complete sweep from `seed`
    ///
    /// # Pipeline
    ///
    /// 1. Parse and canonicalize the seed (the only step that can fail early)
    /// 2. Build one shared fetcher sized to both concurrency ceilings
    /// 3. Start the validator and hold back the seed host's targets
    /// 4. Start discovery; for each PageRecord:
    ///    a. Mark the page (and its landing URL) as known
    ///    b. Submit its references for checking
    ///    c. Add it to the report
    /// 5. Fold verdicts in as they arrive
    /// 6. When discovery ends, release held-back targets and wait for the
    ///    validator to drain
    ///
    /// # Returns
    ///
    /// * `Ok(Report)` - Sweep completed or was cancelled
    /// * `Err(SweepError)` - The seed was invalid or a task failed
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sumi_sweep::{Config, Coordinator, LogObserver};
    /// use std::sync::Arc;
    ///
    /// # async fn example() -> sumi_sweep::Result<()> {
    /// let coordinator = Coordinator::new(Config::default(), Arc::new(LogObserver::default()));
    /// let report = coordinator.run("https://example.com/").await?;
    /// println!("{} broken links", report.summary.broken);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run(&self, seed: &str) -> Result<Report> {
        let start = Instant::now();

        let seed_url = normalize_url(seed).map_err(|source| SweepError::InvalidSeed {
            url: seed.to_string(),
            source,
        })?;
        let seed_host = extract_domain(&seed_url).ok_or_else(|| SweepError::InvalidSeed {
            url: seed.to_string(),
            source: UrlError::MissingDomain,
        })?;

        tracing::info!("Starting sweep of {}", seed_url);

        let pool_size = self
            .config
            .crawler
            .max_concurrent_pages
            .max(self.config.validator.max_concurrent_checks);
        let client = build_http_client(&self.config.user_agent, pool_size)?;
        let fetcher = Fetcher::new(client, self.config.crawler.max_redirects);

        let (validator, mut verdicts, validator_task) = LinkValidator::new(
            fetcher.clone(),
            self.config.validator.clone(),
            self.config.exclude.clone(),
            self.observer.clone(),
        )
        .with_cancel(self.cancel.clone())
        .spawn();
        validator.defer_host(&seed_host);

        let (pages_tx, mut pages_rx) = mpsc::channel(PAGE_CHANNEL_CAPACITY);
        let ctx = DiscoveryContext::new(pages_tx, self.observer.clone(), self.cancel.clone());
        let discovery = tokio::spawn(self.discover(fetcher, seed_url.clone(), ctx));

        let mut aggregator = Aggregator::new();
        loop {
            tokio::select! {
                record = pages_rx.recv() => match record {
                    Some(record) => {
                        self.handle_page(record, &seed_url, &validator, &mut aggregator)
                    }
                    None => break,
                },
                Some(verdict) = verdicts.recv() => aggregator.add_verdict(verdict),
            }
        }

        let discovered = discovery.await;
        tracing::debug!(
            "Discovery finished with {} pages; checking deferred targets",
            aggregator.page_count()
        );

        // Release held-back targets and let the validator drain
        validator.finish();
        while let Some(verdict) = verdicts.recv().await {
            aggregator.add_verdict(verdict);
        }
        let stats = match validator_task.await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::error!("Validator task failed, reporting without host stats: {}", e);
                ValidationStats::default()
            }
        };

        let (origin_host, finished) = match discovered {
            Ok(Ok(outcome)) => (outcome.origin_host, !outcome.cancelled),
            Ok(Err(e)) => {
                tracing::error!("Page discovery failed, report is partial: {}", e);
                (seed_host, false)
            }
            Err(e) => {
                tracing::error!("Page discovery task failed, report is partial: {}", e);
                (seed_host, false)
            }
        };
        let cancelled = !finished || self.cancel.is_cancelled();

        tracing::info!(
            "Sweep {} in {:?}: {} pages",
            if cancelled { "cancelled" } else { "completed" },
            start.elapsed(),
            aggregator.page_count()
        );

        Ok(aggregator.finish(ReportMeta {
            seed: seed_url,
            origin_host,
            config_hash: self.config_hash.clone(),
            elapsed: start.elapsed(),
            cancelled,
            hosts: host_summary(stats),
        }))
    }

    /// Builds the page sources and returns the discovery future
    fn discover(
        &self,
        fetcher: Fetcher,
        seed: Url,
        ctx: DiscoveryContext,
    ) -> impl std::future::Future<Output = Result<CrawlOutcome>> + Send + 'static {
        let robots_agent = self.config.user_agent.crawler_name.clone();

        let crawl = CrawlSource::new(CrawlScheduler::new(
            fetcher.clone(),
            self.config.crawler.clone(),
            self.config.exclude.clone(),
            robots_agent.clone(),
        ));
        let sitemap = self.config.crawler.sitemap_fallback.then(|| {
            SitemapSource::new(SitemapReader::new(
                fetcher,
                self.config.crawler.clone(),
                self.config.exclude.clone(),
                robots_agent,
            ))
        });

        async move {
            let fallback = sitemap.as_ref().map(|source| source as &dyn PageSource);
            discover_with_fallback(&crawl, fallback, &seed, ctx).await
        }
    }

    /// Forwards one settled page to the validator and the report
    fn handle_page(
        &self,
        record: PageRecord,
        seed: &Url,
        validator: &ValidatorHandle,
        aggregator: &mut Aggregator,
    ) {
        self.observer.on_page(&record);

        validator.mark_page(&record.url);
        if record.was_redirected() {
            // A seed redirect can move the crawl to a new origin, whose
            // targets wait like the seed host's
            if record.url == *seed {
                if let Some(host) = extract_domain(&record.final_url) {
                    validator.defer_host(&host);
                }
            }
            validator.mark_page(&record.final_url);
        }

        for reference in &record.references {
            validator.submit(reference, &record.url);
        }

        tracing::debug!(
            "Page {} settled with {} references",
            record.url,
            record.references.len()
        );

        aggregator.add_page(record);
    }
}

fn host_summary(stats: ValidationStats) -> HostSummary {
    HostSummary {
        checked: stats.hosts,
        requests: stats.requests,
        dns_failed: stats.dns_failed_hosts,
        circuit_open: stats.open_circuits,
    }
}
