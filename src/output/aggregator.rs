//! Result aggregation
//!
//! Folds the PageRecord stream and the LinkVerdict stream into a [`Report`].
//! Both streams may arrive in any order and interleave freely; everything is
//! keyed by canonical URL and the report is built in one pass at the end, so
//! the result does not depend on arrival order.

use crate::crawler::PageRecord;
use crate::output::types::{PageStats, Report, ReportMeta, ReportSummary};
use crate::url::canonicalize;
use crate::validator::{classify_status, LinkOutcome, LinkVerdict, Occurrence};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use url::Url;

/// Order-independent fold of pages and verdicts
#[derive(Debug, Default)]
pub struct Aggregator {
    /// Pages by canonical URL
    pages: BTreeMap<Url, PageRecord>,

    /// Canonical landing URL of a redirected page -> the page's URL
    aliases: HashMap<Url, Url>,

    /// Validator outcomes by canonical target
    verdicts: HashMap<Url, LinkOutcome>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page(&mut self, record: PageRecord) {
        if record.was_redirected() {
            self.aliases
                .insert(canonicalize(&record.final_url), record.url.clone());
        }
        self.pages.insert(record.url.clone(), record);
    }

    pub fn add_verdict(&mut self, verdict: LinkVerdict) {
        self.verdicts.insert(verdict.url, verdict.outcome);
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Finds the crawled page a target resolves to, directly or through a redirect
    fn page_for(&self, target: &Url) -> Option<&PageRecord> {
        self.pages.get(target).or_else(|| {
            self.aliases
                .get(target)
                .and_then(|page_url| self.pages.get(page_url))
        })
    }

    /// Builds the final report
    ///
    /// # Resolution
    ///
    /// For every distinct canonical target:
    /// - a validator verdict wins and counts as checked
    /// - otherwise a crawled page resolves it from its fetch result and it
    ///   counts as skipped
    /// - otherwise it stays unresolved (excluded host, images disabled,
    ///   cancelled) and counts as skipped
    pub fn finish(self, meta: ReportMeta) -> Report {
        let mut occurrences: BTreeMap<Url, BTreeSet<Occurrence>> = BTreeMap::new();
        let mut total_references = 0;

        for page in self.pages.values() {
            total_references += page.references.len();
            for reference in &page.references {
                occurrences
                    .entry(canonicalize(&reference.target))
                    .or_default()
                    .insert(Occurrence {
                        page_url: page.url.clone(),
                        text: reference.text.clone(),
                        kind: reference.kind,
                    });
            }
        }

        let mut summary = ReportSummary {
            total_pages: self.pages.len(),
            pages_with_errors: self.pages.values().filter(|p| p.is_error()).count(),
            total_references,
            unique_links: occurrences.len(),
            ..Default::default()
        };

        let mut resolved: HashMap<Url, LinkOutcome> = HashMap::new();
        for target in occurrences.keys() {
            let outcome = if let Some(outcome) = self.verdicts.get(target) {
                summary.checked += 1;
                Some(outcome.clone())
            } else {
                summary.skipped += 1;
                self.page_for(target).map(|page| page_outcome(target, page))
            };

            let Some(outcome) = outcome else {
                continue;
            };

            match &outcome {
                LinkOutcome::Ok => summary.ok += 1,
                LinkOutcome::Redirect { .. } => summary.redirects += 1,
                LinkOutcome::Broken { .. } => summary.broken += 1,
                LinkOutcome::Warning { .. } => summary.warnings += 1,
            }
            resolved.insert(target.clone(), outcome);
        }

        let pages = self
            .pages
            .values()
            .map(|page| page_stats(page, &resolved))
            .collect();

        let issues = occurrences
            .into_iter()
            .filter_map(|(url, occurrences)| {
                let outcome = resolved.remove(&url)?;
                if outcome.is_ok() {
                    return None;
                }
                Some(LinkVerdict {
                    url,
                    outcome,
                    occurrences: occurrences.into_iter().collect(),
                })
            })
            .collect();

        Report {
            generated_at: Utc::now(),
            seed: meta.seed,
            origin_host: meta.origin_host,
            config_hash: meta.config_hash,
            elapsed_ms: meta.elapsed.as_millis() as u64,
            cancelled: meta.cancelled,
            summary,
            hosts: meta.hosts,
            pages,
            issues,
        }
    }
}

/// Outcome of a link to a crawled page, taken from the page's own fetch
fn page_outcome(target: &Url, page: &PageRecord) -> LinkOutcome {
    match page.status {
        Some(status) => classify_status(status, target, &page.final_url),
        None => LinkOutcome::broken(
            None,
            page.error.clone().unwrap_or_else(|| "no response".to_string()),
        ),
    }
}

fn page_stats(page: &PageRecord, resolved: &HashMap<Url, LinkOutcome>) -> PageStats {
    let mut stats = PageStats {
        url: page.url.clone(),
        final_url: page.final_url.clone(),
        status: page.status,
        title: page.title.clone(),
        error: page.error.clone(),
        references: page.references.len(),
        broken: 0,
        warnings: 0,
        redirects: 0,
    };

    for reference in &page.references {
        match resolved.get(&canonicalize(&reference.target)) {
            Some(LinkOutcome::Broken { .. }) => stats.broken += 1,
            Some(LinkOutcome::Warning { .. }) => stats.warnings += 1,
            Some(LinkOutcome::Redirect { .. }) => stats.redirects += 1,
            _ => {}
        }
    }

    stats
}
