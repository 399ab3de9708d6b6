//! Report types
//!
//! The [`Report`] is the only output of a sweep whose content is
//! deterministic: pages, issues and occurrences are sorted by URL.

use crate::validator::{LinkOutcome, LinkVerdict};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Summary counts of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    /// Pages with a PageRecord
    pub total_pages: usize,

    /// Pages whose fetch failed
    pub pages_with_errors: usize,

    /// References across all pages, before deduplication
    pub total_references: usize,

    /// Distinct canonical targets
    pub unique_links: usize,

    /// Targets the validator checked over the network
    pub checked: usize,

    /// Targets not checked: crawled pages, excluded hosts, disabled images
    pub skipped: usize,

    pub ok: usize,
    pub broken: usize,
    pub warnings: usize,
    pub redirects: usize,
}

impl ReportSummary {
    /// Targets with a known outcome
    pub fn resolved(&self) -> usize {
        self.ok + self.broken + self.warnings + self.redirects
    }

    /// Returns the broken rate as a percentage of resolved targets
    pub fn broken_rate(&self) -> f64 {
        let resolved = self.resolved();
        if resolved == 0 {
            return 0.0;
        }
        (self.broken as f64 / resolved as f64) * 100.0
    }
}

/// Per-page breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageStats {
    pub url: Url,
    pub final_url: Url,
    pub status: Option<u16>,
    pub title: Option<String>,
    pub error: Option<String>,

    /// References on the page, before deduplication
    pub references: usize,

    pub broken: usize,
    pub warnings: usize,
    pub redirects: usize,
}

/// Host-level findings from the validator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HostSummary {
    /// Hosts that got a check lane
    pub checked: usize,

    /// HTTP requests sent while checking
    pub requests: u32,

    /// Hosts that did not resolve
    pub dns_failed: Vec<String>,

    /// Hosts whose circuit opened
    pub circuit_open: Vec<String>,
}

/// Run metadata supplied when the report is built
#[derive(Debug, Clone)]
pub struct ReportMeta {
    pub seed: Url,
    pub origin_host: String,
    pub config_hash: Option<String>,
    pub elapsed: Duration,
    pub cancelled: bool,
    pub hosts: HostSummary,
}

/// Final result of a sweep
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub seed: Url,

    /// Origin host after any seed redirect
    pub origin_host: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,

    pub elapsed_ms: u64,

    /// True if the sweep was cancelled before it finished
    pub cancelled: bool,

    pub summary: ReportSummary,
    pub hosts: HostSummary,
    pub pages: Vec<PageStats>,

    /// Every target whose outcome is not ok
    pub issues: Vec<LinkVerdict>,
}

impl Report {
    pub fn broken(&self) -> impl Iterator<Item = &LinkVerdict> {
        self.issues.iter().filter(|v| v.outcome.is_broken())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &LinkVerdict> {
        self.issues.iter().filter(|v| v.outcome.is_warning())
    }

    pub fn redirects(&self) -> impl Iterator<Item = &LinkVerdict> {
        self.issues.iter().filter(|v| v.outcome.is_redirect())
    }

    pub fn has_broken_links(&self) -> bool {
        self.summary.broken > 0
    }

    /// Looks up the verdict for a canonical target, if it is an issue
    pub fn issue(&self, url: &Url) -> Option<&LinkOutcome> {
        self.issues
            .binary_search_by(|v| v.url.cmp(url))
            .ok()
            .map(|i| &self.issues[i].outcome)
    }
}
