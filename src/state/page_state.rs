/// Page and crawl state definitions for tracking discovery progress
///
/// A page moves `Pending -> InFlight -> Done` exactly once; the crawl as a
/// whole moves `Running -> Draining -> Finished`.
use std::fmt;

/// Represents where a canonical URL is in the crawl frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageState {
    /// Queued, not yet claimed by a fetch
    Pending,

    /// Claimed and currently being fetched
    InFlight,

    /// Fetch settled (success or error), or known through a redirect
    Done,
}

impl PageState {
    /// Returns the lowercase name of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Global phase of one crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// New URLs are being claimed and fetched
    Running,

    /// No new work is scheduled; in-flight fetches are settling
    Draining,

    /// Nothing pending, nothing in flight
    Finished,
}

impl CrawlPhase {
    /// Returns true if new fetches may still be started
    pub fn accepts_work(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Finished => "finished",
        };
        write!(f, "{}", name)
    }
}
