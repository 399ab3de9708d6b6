//! Crawl frontier: the visited, in-flight and pending sets of one crawl
//!
//! The frontier is owned by the scheduler loop and never shared, so every
//! check-and-mark below is a single indivisible step on `&mut self`.

use crate::state::PageState;
use std::collections::{HashSet, VecDeque};
use url::Url;

/// Frontier over canonical URLs
///
/// A URL enters `visited` exactly once, when it is claimed, and never
/// leaves. A URL that is visited, in flight or pending is never queued
/// again.
#[derive(Debug)]
pub struct CrawlFrontier {
    /// FIFO of URLs waiting to be claimed
    pending: VecDeque<Url>,

    /// Membership index for `pending`
    queued: HashSet<Url>,

    /// Every URL ever claimed, plus redirect targets known to be pages
    visited: HashSet<Url>,

    in_flight: HashSet<Url>,

    /// Maximum number of pages this crawl may claim
    page_cap: usize,

    /// Number of claims made so far
    claimed: usize,

    /// Set once the crawl stops accepting work
    closed: bool,
}

impl CrawlFrontier {
    pub fn new(page_cap: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            queued: HashSet::new(),
            visited: HashSet::new(),
            in_flight: HashSet::new(),
            page_cap,
            claimed: 0,
            closed: false,
        }
    }

    /// Creates a frontier that treats `visited` as already crawled
    pub fn with_visited(page_cap: usize, visited: HashSet<Url>) -> Self {
        Self {
            visited,
            ..Self::new(page_cap)
        }
    }

    /// Queues a canonical URL unless it is already known or the cap is reached
    ///
    /// Returns true if the URL was added to pending.
    pub fn try_enqueue(&mut self, url: Url) -> bool {
        if self.closed || self.claimed + self.queued.len() >= self.page_cap {
            return false;
        }

        if self.visited.contains(&url) || self.in_flight.contains(&url) {
            return false;
        }

        if !self.queued.insert(url.clone()) {
            return false;
        }

        self.pending.push_back(url);
        true
    }

    /// Atomically moves a URL to visited and in-flight
    ///
    /// Returns true if the caller now owns fetching `url`. A URL that was
    /// already claimed returns false, whatever path it arrived by.
    pub fn try_claim(&mut self, url: &Url) -> bool {
        if self.closed || self.claimed >= self.page_cap || self.visited.contains(url) {
            return false;
        }

        self.queued.remove(url);
        self.visited.insert(url.clone());
        self.in_flight.insert(url.clone());
        self.claimed += 1;
        true
    }

    /// Claims up to `max` pending URLs in FIFO order
    pub fn claim_batch(&mut self, max: usize) -> Vec<Url> {
        let mut batch = Vec::new();

        while batch.len() < max {
            let Some(url) = self.pending.pop_front() else {
                break;
            };

            // Entries claimed or marked visited since queuing are stale
            if !self.queued.contains(&url) {
                continue;
            }

            if self.try_claim(&url) {
                batch.push(url);
            } else {
                self.queued.remove(&url);
            }
        }

        batch
    }

    /// Marks an in-flight URL as settled
    pub fn complete(&mut self, url: &Url) {
        self.in_flight.remove(url);
    }

    /// Records a URL as a known page without fetching it
    ///
    /// Used for the canonical final URL of a redirect, so that links to the
    /// landing page do not schedule a second fetch of the same document.
    pub fn mark_visited(&mut self, url: Url) {
        self.queued.remove(&url);
        self.visited.insert(url);
    }

    /// Stops accepting work and discards everything pending
    pub fn close(&mut self) {
        self.closed = true;
        self.pending.clear();
        self.queued.clear();
    }

    /// Returns true when nothing is pending or in flight
    pub fn is_drained(&self) -> bool {
        self.queued.is_empty() && self.in_flight.is_empty()
    }

    pub fn has_pending(&self) -> bool {
        !self.queued.is_empty()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn claimed_count(&self) -> usize {
        self.claimed
    }

    /// Number of distinct pages discovered so far (claimed plus pending)
    pub fn discovered_count(&self) -> usize {
        self.claimed + self.queued.len()
    }

    /// Returns where a URL is in its lifecycle, if the frontier knows it
    pub fn state_of(&self, url: &Url) -> Option<PageState> {
        if self.in_flight.contains(url) {
            Some(PageState::InFlight)
        } else if self.visited.contains(url) {
            Some(PageState::Done)
        } else if self.queued.contains(url) {
            Some(PageState::Pending)
        } else {
            None
        }
    }

    pub fn visited(&self) -> &HashSet<Url> {
        &self.visited
    }

    pub fn into_visited(self) -> HashSet<Url> {
        self.visited
    }
}
