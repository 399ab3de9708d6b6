//! Progress observation
//!
//! The engine reports what it is doing through a [`ProgressObserver`] rather
//! than printing anything itself. Every method has a no-op default, so an
//! observer only implements the events it cares about.

use crate::crawler::PageRecord;
use crate::validator::LinkVerdict;

/// Receives progress events from a running sweep
///
/// Methods are called from the engine's tasks and must not block.
pub trait ProgressObserver: Send + Sync {
    /// Called whenever the crawl frontier changes
    ///
    /// `found` counts distinct pages discovered so far, `crawled` the pages
    /// whose fetch has settled.
    fn on_crawl_progress(&self, _found: usize, _crawled: usize) {}

    /// Called once for each settled page
    fn on_page(&self, _page: &PageRecord) {}

    /// Called for every verdict as soon as the validator produces it
    fn on_verdict(&self, _verdict: &LinkVerdict) {}

    /// Called for verdicts whose outcome is broken
    fn on_broken_link(&self, _verdict: &LinkVerdict) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

/// Observer that writes progress through `tracing`
#[derive(Debug, Clone, Copy)]
pub struct LogObserver {
    /// Log crawl progress every this many settled pages
    every: usize,
}

impl LogObserver {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
        }
    }
}

impl Default for LogObserver {
    fn default() -> Self {
        Self::new(10)
    }
}

impl ProgressObserver for LogObserver {
    fn on_crawl_progress(&self, found: usize, crawled: usize) {
        if crawled % self.every == 0 {
            tracing::info!("Progress: {} pages crawled, {} discovered", crawled, found);
        }
    }

    fn on_page(&self, page: &PageRecord) {
        match &page.error {
            Some(error) => tracing::debug!("Page {} failed: {}", page.url, error),
            None => tracing::debug!(
                "Page {} ({} references)",
                page.url,
                page.references.len()
            ),
        }
    }

    fn on_broken_link(&self, verdict: &LinkVerdict) {
        tracing::info!("Broken: {} ({})", verdict.url, verdict.outcome);
    }
}
